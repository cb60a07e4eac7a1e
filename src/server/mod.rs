//! Read-only HTTP server for the dashboard.
//!
//! Serves the precomputed aggregates, live recomputations over the cleaned
//! snapshot, and the static HTML pages that chart them.

pub mod cache;
pub mod error;
pub mod handlers;
pub mod pages;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::reference::ReferenceTables;
use crate::snapshot::{self, CLEAN_FILE, SnapshotPaths};
use crate::table::Table;
use cache::SnapshotCache;
use error::ApiError;

/// Number of parsed JSON files kept in memory.
pub const JSON_CACHE_CAPACITY: usize = 16;
/// Number of parsed columnar snapshots kept in memory.
pub const TABLE_CACHE_CAPACITY: usize = 4;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub paths: SnapshotPaths,
    pub static_dir: PathBuf,
    pub refs: Arc<ReferenceTables>,
    json_cache: Arc<SnapshotCache<serde_json::Value>>,
    table_cache: Arc<SnapshotCache<Table>>,
}

impl AppState {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        static_dir: impl Into<PathBuf>,
        refs: ReferenceTables,
    ) -> Self {
        Self {
            paths: SnapshotPaths::new(data_dir),
            static_dir: static_dir.into(),
            refs: Arc::new(refs),
            json_cache: Arc::new(SnapshotCache::new(JSON_CACHE_CAPACITY)),
            table_cache: Arc::new(SnapshotCache::new(TABLE_CACHE_CAPACITY)),
        }
    }

    /// Parsed contents of a precomputed JSON file.
    pub async fn json(&self, name: &str) -> Result<Arc<serde_json::Value>, ApiError> {
        let cache = Arc::clone(&self.json_cache);
        let path = self.paths.file(name);
        let key = name.to_string();
        let value = tokio::task::spawn_blocking(move || {
            cache.get_or_load(&key, &path, snapshot::read_json)
        })
        .await??;
        Ok(value)
    }

    /// The cleaned columnar snapshot.
    pub async fn table(&self) -> Result<Arc<Table>, ApiError> {
        let cache = Arc::clone(&self.table_cache);
        let path = self.paths.clean();
        let value = tokio::task::spawn_blocking(move || {
            cache.get_or_load(CLEAN_FILE, &path, snapshot::read_parquet)
        })
        .await??;
        Ok(value)
    }

    /// Forgets every parsed file.
    pub fn invalidate(&self) {
        self.json_cache.clear();
        self.table_cache.clear();
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/domaines", get(pages::domaines))
        .route("/academies", get(pages::academies))
        .route("/genre", get(pages::genre))
        .route("/equite", get(pages::equite))
        .route("/conclusion", get(pages::conclusion))
        .route("/healthz", get(handlers::healthz))
        .route("/api/by_year", get(handlers::api_by_year))
        .route("/api/by_domaine", get(handlers::api_by_domaine))
        .route("/api/by_academie", get(handlers::api_by_academie))
        .route("/api/by_region", get(handlers::api_by_region))
        .route("/api/genre_by_domaine", get(handlers::api_genre_by_domaine))
        .route("/api/genre_by_year", get(handlers::api_genre_by_year))
        .route("/api/equite_by_domaine", get(handlers::api_equite_by_domaine))
        .route("/api/academies_map", get(handlers::api_academies_map))
        .route("/static/*path", get(pages::static_file))
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl+C.
///
/// On unix, SIGHUP drops every cached file so a re-run pipeline is picked
/// up immediately.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    #[cfg(unix)]
    spawn_reload_on_hangup(state.clone())?;

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("server failed")?;
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_hangup(state: AppState) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            state.invalidate();
            info!("SIGHUP received, snapshot cache cleared");
        }
    });
    Ok(())
}
