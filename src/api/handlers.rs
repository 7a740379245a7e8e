//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::backing::FsStore;
use crate::cache::{Cache, CacheContext};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, ListResponse, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// Holds one cache instance; its context is shared with every clone.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Serves documents from a filesystem store rooted at `data_dir`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let context = CacheContext::with_config(config.cache.clone())?;
        let store = Arc::new(FsStore::new(config.data_dir.clone()));
        Ok(Self::new(context.cache(store)))
    }

    pub fn context(&self) -> &CacheContext {
        self.cache.context()
    }
}

/// Handler for GET /json/*path
pub async fn get_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<GetResponse>> {
    let data = state.cache.get_json(&path).await?;
    Ok(Json(GetResponse::new(path, data)))
}

/// Handler for PUT /json/*path
///
/// Returns once the document is cached; it reaches disk with the next drain.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(data): Json<Value>,
) -> Result<Json<SetResponse>> {
    state.cache.set_json(&path, &data).await?;
    Ok(Json(SetResponse::new(path)))
}

/// Handler for DELETE /json/*path
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&path).await?;
    Ok(Json(DeleteResponse::new(path)))
}

/// Handler for GET /list and GET /list/*path
pub async fn list_handler(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> Result<Json<ListResponse>> {
    let path = path.map(|Path(path)| path).unwrap_or_default();
    let entries = state.cache.list(&path).await?;
    Ok(Json(ListResponse::new(path, entries)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.context().stats().await;
    Json(StatsResponse::from(stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
