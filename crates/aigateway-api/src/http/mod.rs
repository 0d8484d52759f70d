//! HTTP layer for the AI gateway.
//!
//! Axum-based flat route table (SPEC_FULL.md §11) with optional bearer
//! authentication and CORS support. Handler responses are plain typed JSON
//! bodies, not a wrapping envelope.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
