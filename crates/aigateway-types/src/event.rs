//! Workflow lifecycle events (SPEC_FULL.md §3, §11).
//!
//! `Event` is the unified type delivered to SSE subscribers and to the
//! in-process event bus. All variants are `Clone + Send + Sync`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An event emitted during workflow execution, keyed to the workflow id it
/// concerns. Ordering of events for a single id is preserved end to end;
/// after `WorkflowComplete`/`WorkflowFailed` no further event is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "workflow:queued")]
    WorkflowQueued {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        name: String,
        position: usize,
    },

    #[serde(rename = "workflow:started")]
    WorkflowStarted {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        name: String,
        total_steps: usize,
    },

    #[serde(rename = "workflow:complete")]
    WorkflowComplete {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        result: Value,
        duration_ms: u64,
    },

    #[serde(rename = "workflow:failed")]
    WorkflowFailed {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        error: String,
        duration_ms: u64,
    },

    #[serde(rename = "step:started")]
    StepStarted {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        index: usize,
        name: String,
    },

    #[serde(rename = "step:complete")]
    StepComplete {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        index: usize,
        name: String,
        service: String,
        duration_ms: u64,
    },

    #[serde(rename = "step:failed")]
    StepFailed {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        index: usize,
        name: String,
        error: String,
    },

    #[serde(rename = "step:skipped")]
    StepSkipped {
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
        index: usize,
        name: String,
        reason: String,
    },
}

impl Event {
    pub fn workflow_id(&self) -> Uuid {
        match self {
            Event::WorkflowQueued { workflow_id, .. }
            | Event::WorkflowStarted { workflow_id, .. }
            | Event::WorkflowComplete { workflow_id, .. }
            | Event::WorkflowFailed { workflow_id, .. }
            | Event::StepStarted { workflow_id, .. }
            | Event::StepComplete { workflow_id, .. }
            | Event::StepFailed { workflow_id, .. }
            | Event::StepSkipped { workflow_id, .. } => *workflow_id,
        }
    }

    /// Whether this event is the final one for its workflow id.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::WorkflowComplete { .. } | Event::WorkflowFailed { .. })
    }

    /// The SSE `event:` line name, matching the `#[serde(rename)]` tag.
    pub fn sse_event_name(&self) -> &'static str {
        match self {
            Event::WorkflowQueued { .. } => "workflow:queued",
            Event::WorkflowStarted { .. } => "workflow:started",
            Event::WorkflowComplete { .. } => "workflow:complete",
            Event::WorkflowFailed { .. } => "workflow:failed",
            Event::StepStarted { .. } => "step:started",
            Event::StepComplete { .. } => "step:complete",
            Event::StepFailed { .. } => "step:failed",
            Event::StepSkipped { .. } => "step:skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::now_v7()
    }

    #[test]
    fn workflow_complete_is_terminal() {
        let e = Event::WorkflowComplete {
            workflow_id: id(),
            timestamp: Utc::now(),
            result: Value::Null,
            duration_ms: 10,
        };
        assert!(e.is_terminal());
    }

    #[test]
    fn step_events_are_not_terminal() {
        let e = Event::StepStarted {
            workflow_id: id(),
            timestamp: Utc::now(),
            index: 0,
            name: "s".into(),
        };
        assert!(!e.is_terminal());
    }

    #[test]
    fn serde_tag_matches_sse_event_name() {
        let wf = id();
        let e = Event::StepSkipped {
            workflow_id: wf,
            timestamp: Utc::now(),
            index: 1,
            name: "s2".into(),
            reason: "condition false".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"type\":\"step:skipped\""));
        assert_eq!(e.sse_event_name(), "step:skipped");
        assert_eq!(e.workflow_id(), wf);
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Event::StepSkipped { index: 1, .. }));
    }
}
