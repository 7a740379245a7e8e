//! API Module
//!
//! HTTP handlers and routing for the document cache server.
//!
//! # Endpoints
//! - `GET /json/*path` - Read a document
//! - `PUT /json/*path` - Write a document (JSON body)
//! - `DELETE /json/*path` - Delete a document
//! - `GET /list`, `GET /list/*path` - List a folder after draining pending writes
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
