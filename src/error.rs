//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Document is absent from the backing store, or deleted locally
    #[error("Cannot load \"{0}\"")]
    NotFound(String),

    /// Backing store failed to read, write, delete or list
    #[error("Backing store error: {0}")]
    Store(#[source] StoreError),

    /// Document could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rejected configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path cannot address a document
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl CacheError {
    /// Returns true for the not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            CacheError::NotFound(err.path().unwrap_or_default().to_string())
        } else {
            CacheError::Store(err)
        }
    }
}

// == Store Error Enum ==
/// Failure reported by a backing store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Nothing is stored at the path
    #[error("Cannot read \"{0}\"")]
    NotFound(String),

    /// Underlying I/O failure
    #[error("I/O error at \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other backend-specific failure
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Wraps an I/O error, keeping the path it happened at.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Classifies the error as "not found".
    ///
    /// `Io` errors of kind `NotFound` count as well, so backends that bubble up
    /// raw filesystem errors are still recognized.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            StoreError::Backend(_) => false,
        }
    }

    /// Path the error refers to, when known.
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreError::NotFound(path) | StoreError::Io { path, .. } => Some(path),
            StoreError::Backend(_) => None,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
