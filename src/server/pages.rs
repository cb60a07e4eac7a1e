//! HTML shells and static assets.
//!
//! Pages are compiled into the binary; they chart the API client-side.

use std::path::{Component, Path as FsPath, PathBuf};

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};

use crate::server::AppState;
use crate::server::error::ApiError;

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../templates/index.html"))
}

pub async fn domaines() -> Html<&'static str> {
    Html(include_str!("../../templates/domaines.html"))
}

pub async fn academies() -> Html<&'static str> {
    Html(include_str!("../../templates/academies.html"))
}

pub async fn genre() -> Html<&'static str> {
    Html(include_str!("../../templates/genre.html"))
}

pub async fn equite() -> Html<&'static str> {
    Html(include_str!("../../templates/equite.html"))
}

pub async fn conclusion() -> Html<&'static str> {
    Html(include_str!("../../templates/conclusion.html"))
}

/// Serves a file below the static directory.
pub async fn static_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let full = resolve_static(&state.static_dir, &path)
        .ok_or_else(|| ApiError::NotFound(format!("static/{path}")))?;
    let bytes = tokio::fs::read(&full)
        .await
        .map_err(|_| ApiError::NotFound(format!("static/{path}")))?;
    Ok(([(header::CONTENT_TYPE, content_type(&full))], bytes))
}

/// Joins `requested` below `root`, refusing anything but plain components.
fn resolve_static(root: &FsPath, requested: &str) -> Option<PathBuf> {
    let relative = FsPath::new(requested);
    let mut components = relative.components().peekable();
    components.peek()?;
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(relative))
    } else {
        None
    }
}

fn content_type(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "js" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "geojson" => "application/json",
        "html" => "text/html; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
