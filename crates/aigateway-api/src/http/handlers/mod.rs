//! HTTP request handlers for the gateway's flat route table (SPEC_FULL.md §11).

pub mod completion;
pub mod workflow;
