//! Workflow engine core.
//!
//! - `definition` -- flat ordered steps, closure-based transformers, fluent builder
//! - `context` -- per-execution result tracking, index- and name-keyed
//! - `executor` -- FIFO admission queue, bounded driver pool, sequential step driver

pub mod context;
pub mod definition;
pub mod executor;
