//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::backing::Listing;
use crate::cache::CacheStats;

/// Response body for GET /json/*path
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested path
    pub path: String,
    /// The stored document
    pub data: Value,
}

impl GetResponse {
    pub fn new(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

/// Response body for PUT /json/*path
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The path that was written
    pub path: String,
}

impl SetResponse {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("Document '{}' stored", path),
            path,
        }
    }
}

/// Response body for DELETE /json/*path
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The path that was deleted
    pub path: String,
}

impl DeleteResponse {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: format!("Document '{}' deleted", path),
            path,
        }
    }
}

/// Response body for GET /list and GET /list/*path
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    /// The listed path, empty for the root
    pub path: String,
    /// Listed paths and their kinds
    pub entries: Listing,
}

impl ListResponse {
    pub fn new(path: impl Into<String>, entries: Listing) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Reads served from memory
    pub hits: u64,
    /// Reads that went to the backing store or failed
    pub misses: u64,
    /// Clean entries evicted under memory pressure
    pub evictions: u64,
    /// Write actions persisted
    pub writes_flushed: u64,
    /// Delete actions persisted
    pub deletes_flushed: u64,
    /// Drain batches aborted by a backing store failure
    pub flush_failures: u64,
    /// Current number of resident entries
    pub total_entries: usize,
    /// Current memory usage in characters
    pub memory_usage: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            writes_flushed: stats.writes_flushed,
            deletes_flushed: stats.deletes_flushed,
            flush_failures: stats.flush_failures,
            total_entries: stats.total_entries,
            memory_usage: stats.memory_usage,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
