//! Shared domain types for the AI gateway.
//!
//! Provider categories, completion/result shapes, the workflow data model,
//! the event taxonomy, the error taxonomy, and gateway configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, chrono,
//! thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod workflow;

pub use config::GatewayConfig;
pub use error::{ErrorCode, GatewayError};
pub use event::Event;
pub use llm::Category;
