//! JSON API handlers. All of them are pure reads.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::aggregate::{AggregateTable, live};
use crate::columns::ACADEMY;
use crate::reference::ReferenceTables;
use crate::server::AppState;
use crate::server::error::ApiError;
use crate::snapshot::{BY_ACADEMIE_FILE, BY_REGION_FILE, BY_YEAR_FILE};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn precomputed(state: &AppState, name: &str) -> ApiResult<Value> {
    let value = state.json(name).await?;
    Ok(Json(value.as_ref().clone()))
}

pub async fn api_by_year(State(state): State<AppState>) -> ApiResult<Value> {
    precomputed(&state, BY_YEAR_FILE).await
}

pub async fn api_by_academie(State(state): State<AppState>) -> ApiResult<Value> {
    precomputed(&state, BY_ACADEMIE_FILE).await
}

pub async fn api_by_region(State(state): State<AppState>) -> ApiResult<Value> {
    precomputed(&state, BY_REGION_FILE).await
}

pub async fn api_by_domaine(State(state): State<AppState>) -> ApiResult<AggregateTable> {
    let table = state.table().await?;
    Ok(Json(live::by_domaine(&table)))
}

pub async fn api_genre_by_domaine(State(state): State<AppState>) -> ApiResult<AggregateTable> {
    let table = state.table().await?;
    Ok(Json(live::genre_by_domaine(&table)))
}

pub async fn api_genre_by_year(State(state): State<AppState>) -> ApiResult<AggregateTable> {
    let table = state.table().await?;
    Ok(Json(live::genre_by_year(&table)))
}

pub async fn api_equite_by_domaine(State(state): State<AppState>) -> ApiResult<AggregateTable> {
    let table = state.table().await?;
    Ok(Json(live::equite_by_domaine(&table)))
}

pub async fn api_academies_map(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    let by_academie = state.json(BY_ACADEMIE_FILE).await?;
    Ok(Json(with_coordinates(&by_academie, &state.refs)))
}

/// Adds `lat`/`lon` to each academy row; rows without known coordinates
/// are dropped.
pub fn with_coordinates(rows: &Value, refs: &ReferenceTables) -> Vec<Value> {
    let Some(rows) = rows.as_array() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let academy = row.get(ACADEMY)?.as_str()?;
            let (lat, lon) = refs.coords_of(academy)?;
            let mut row = row.as_object()?.clone();
            row.insert("lat".into(), json!(lat));
            row.insert("lon".into(), json!(lon));
            Some(Value::Object(row))
        })
        .collect()
}
