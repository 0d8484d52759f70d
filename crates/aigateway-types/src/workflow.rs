//! Persisted workflow status types (SPEC_FULL.md §3).
//!
//! `WorkflowDefinition` and its steps are not here: they carry `Box<dyn Fn>`
//! transformer closures and a fluent builder, and live in
//! `aigateway-core::workflow::definition` where they're constructed in Rust
//! code rather than deserialized. What's here is the serializable record a
//! `StateManager` persists and the HTTP surface returns: the single source
//! of truth for "what state is workflow X in right now."

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Overall status of a workflow run. `Completed` and `Failed` are sticky:
/// no field but TTL bookkeeping may change after reaching one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

/// Status of an individual step within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Error detail attached to a failed workflow, carrying enough for a
/// client to decide whether to retry (SPEC_FULL.md §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Record of a single step's execution, embedded in `WorkflowStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatus {
    pub index: usize,
    pub name: String,
    pub category: String,
    pub status: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StepStatus {
    pub fn pending(index: usize, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            category: category.into(),
            status: StepState::Pending,
            service: None,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }
}

/// The persisted record of a single workflow run. Keyed by `id` in the
/// state manager. `updated_at` is monotonic non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub id: Uuid,
    pub name: String,
    pub status: WorkflowState,
    pub current_step: usize,
    pub total_steps: usize,
    pub steps: Vec<StepStatus>,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkflowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowStatus {
    pub fn new(id: Uuid, name: impl Into<String>, input: Value, steps: Vec<StepStatus>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            status: WorkflowState::Pending,
            current_step: 0,
            total_steps: steps.len(),
            steps,
            input,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_match_spec() {
        assert!(WorkflowState::Completed.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(!WorkflowState::Running.is_terminal());
        assert!(!WorkflowState::Queued.is_terminal());
        assert!(!WorkflowState::Pending.is_terminal());
    }

    #[test]
    fn new_status_has_all_steps_pending_and_index_matches_position() {
        let steps = vec![
            StepStatus::pending(0, "a", "text"),
            StepStatus::pending(1, "b", "image"),
        ];
        let status = WorkflowStatus::new(Uuid::now_v7(), "wf", Value::Null, steps);
        assert_eq!(status.total_steps, 2);
        assert_eq!(status.current_step, 0);
        assert_eq!(status.status, WorkflowState::Pending);
        for (i, step) in status.steps.iter().enumerate() {
            assert_eq!(step.index, i);
            assert_eq!(step.status, StepState::Pending);
        }
    }

    #[test]
    fn serde_roundtrip_preserves_shape() {
        let steps = vec![StepStatus::pending(0, "a", "text")];
        let status = WorkflowStatus::new(Uuid::now_v7(), "wf", Value::Null, steps);
        let json = serde_json::to_string(&status).unwrap();
        let parsed: WorkflowStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "wf");
        assert_eq!(parsed.steps.len(), 1);
    }
}
