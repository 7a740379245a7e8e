//! Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing HTTP response bodies. Request bodies are the JSON documents
//! themselves.

pub mod responses;

// Re-export commonly used types
pub use responses::{
    DeleteResponse, ErrorResponse, GetResponse, HealthResponse, ListResponse, SetResponse,
    StatsResponse,
};
