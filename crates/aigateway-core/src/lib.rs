//! Provider registry, failover, and workflow orchestration engine.
//!
//! This crate defines the "ports" the infrastructure layer implements
//! (`llm::provider`'s category traits, `state::StateManager`) plus the
//! logic that drives them: the round-robin registry and failover
//! executor (`llm`), the per-workflow event fan-out (`event`), the
//! sequential workflow driver and its admission pool (`workflow`), and
//! the pure input/output shaping functions threading data between steps
//! (`transformers`). Depends only on `aigateway-types` -- never on
//! `aigateway-infra` or any HTTP/database client crate.

pub mod event;
pub mod llm;
pub mod state;
pub mod transformers;
pub mod workflow;
