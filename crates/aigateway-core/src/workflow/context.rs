//! Per-execution workflow context (SPEC_FULL.md §3, "Workflow context").
//!
//! Replaces the reference codebase's `WorkflowContext`, which resolves
//! `{{ steps.x.output }}`-style templates against a `HashMap<String, Value>`
//! keyed by string step id. This gateway's steps carry typed Rust closures
//! instead of templates, so the context only needs to hold results by
//! index and by name and answer direct lookups -- no string scanning.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

/// Ephemeral, per-execution value created when a workflow driver begins
/// and discarded when it returns. Never persisted -- the persisted
/// `StepStatus` records carry the same information for post-hoc
/// inspection (see [`aigateway_types::workflow::WorkflowStatus`]).
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub input: Value,
    pub current_step: usize,
    results: Vec<Value>,
    results_by_name: HashMap<String, Value>,
}

impl WorkflowContext {
    pub fn new(workflow_id: Uuid, workflow_name: String, input: Value) -> Self {
        Self {
            workflow_id,
            workflow_name,
            input,
            current_step: 0,
            results: Vec::new(),
            results_by_name: HashMap::new(),
        }
    }

    /// Record step `index`'s result, optionally also indexing it by name.
    /// Steps are appended in execution order, so `index` is always
    /// `self.results.len()` when called from the driver.
    pub fn set_result(&mut self, index: usize, name: Option<&str>, result: Value) {
        if index >= self.results.len() {
            self.results.resize(index + 1, Value::Null);
        }
        self.results[index] = result.clone();
        if let Some(name) = name {
            self.results_by_name.insert(name.to_string(), result);
        }
    }

    /// The result of the step immediately before `current_step`, or `None`
    /// if this is the first step or nothing has completed yet.
    pub fn previous_result(&self) -> Option<&Value> {
        if self.current_step == 0 {
            return None;
        }
        self.results.get(self.current_step - 1)
    }

    pub fn get_result(&self, index: usize) -> Option<&Value> {
        self.results.get(index)
    }

    pub fn get_result_by_name(&self, name: &str) -> Option<&Value> {
        self.results_by_name.get(name)
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> WorkflowContext {
        WorkflowContext::new(Uuid::now_v7(), "demo".to_string(), json!({"prompt": "hi"}))
    }

    #[test]
    fn set_result_indexes_by_position_and_optionally_by_name() {
        let mut c = ctx();
        c.set_result(0, Some("draft"), json!("hello"));
        assert_eq!(c.get_result(0), Some(&json!("hello")));
        assert_eq!(c.get_result_by_name("draft"), Some(&json!("hello")));
    }

    #[test]
    fn previous_result_is_none_before_any_step_completes() {
        let c = ctx();
        assert_eq!(c.previous_result(), None);
    }

    #[test]
    fn previous_result_tracks_current_step_cursor() {
        let mut c = ctx();
        c.set_result(0, None, json!("first"));
        c.current_step = 1;
        assert_eq!(c.previous_result(), Some(&json!("first")));
    }

    #[test]
    fn get_result_by_name_is_none_for_unknown_name() {
        let c = ctx();
        assert_eq!(c.get_result_by_name("nope"), None);
    }

    #[test]
    fn results_accumulate_in_order() {
        let mut c = ctx();
        c.set_result(0, None, json!("a"));
        c.set_result(1, None, json!("b"));
        assert_eq!(c.results(), &[json!("a"), json!("b")]);
    }
}
