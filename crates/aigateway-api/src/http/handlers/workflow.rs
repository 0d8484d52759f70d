//! Workflow listing, submission, status, history, and live-progress
//! handlers (SPEC_FULL.md §6.1, §6.2, §11).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use aigateway_types::workflow::WorkflowStatus;
use aigateway_core::state::{ListFilter, StateManager};
use aigateway_types::workflow::WorkflowState;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Query parameters for `GET /workflow/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<WorkflowState>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET /workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    step_count: usize,
}

/// `GET /workflow` → `{workflows: [{name, description?, stepCount}], queueLength, runningCount}`.
pub async fn list_workflows(State(state): State<AppState>, _auth: Authenticated) -> Json<Value> {
    let mut names: Vec<&String> = state.workflows.keys().collect();
    names.sort();
    let workflows: Vec<WorkflowSummary> = names
        .into_iter()
        .map(|name| {
            let definition = &state.workflows[name];
            WorkflowSummary {
                name: definition.name.clone(),
                description: definition.description.clone(),
                step_count: definition.steps.len(),
            }
        })
        .collect();

    let queue_length = state.executor.queue_depth().await;
    let running_count = state.executor.pool_stats().running;

    Json(json!({
        "workflows": workflows,
        "queueLength": queue_length,
        "runningCount": running_count,
    }))
}

// ---------------------------------------------------------------------------
// GET /workflow/history
// ---------------------------------------------------------------------------

/// `GET /workflow/history?status=&limit=` → `[WorkflowStatus, ...]`, newest first.
pub async fn history(State(state): State<AppState>, _auth: Authenticated, Query(query): Query<HistoryQuery>) -> Json<Vec<WorkflowStatus>> {
    let records = state
        .executor
        .state()
        .list(ListFilter {
            status: query.status,
            limit: query.limit,
        })
        .await;
    Json(records)
}

// ---------------------------------------------------------------------------
// POST /workflow/:name
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub input: Value,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    #[serde(rename = "workflowId")]
    workflow_id: Uuid,
    name: String,
    status: WorkflowState,
    #[serde(rename = "statusUrl")]
    status_url: String,
    #[serde(rename = "streamUrl")]
    stream_url: String,
}

/// `POST /workflow/:name` → `202 {workflowId, name, status, statusUrl, streamUrl}`.
pub async fn submit(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(name): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<(axum::http::StatusCode, Json<SubmitResponse>), AppError> {
    let definition = state
        .workflows
        .get(&name)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("workflow '{name}' not found")))?;

    let workflow_id = state.executor.submit(definition, body.input).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(SubmitResponse {
            workflow_id,
            name,
            status: WorkflowState::Pending,
            status_url: format!("/workflow/{workflow_id}/status"),
            stream_url: format!("/workflow/{workflow_id}/stream"),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /workflow/:id/status
// ---------------------------------------------------------------------------

/// `GET /workflow/:id/status` → `200 WorkflowStatus` or `404 {name, message, service: null, code: null}`.
pub async fn status(State(state): State<AppState>, _auth: Authenticated, Path(id): Path<Uuid>) -> Result<Json<WorkflowStatus>, AppError> {
    state
        .executor
        .state()
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("workflow run '{id}' not found")))
}

// ---------------------------------------------------------------------------
// GET /workflow/:id/stream
// ---------------------------------------------------------------------------

/// `GET /workflow/:id/stream` — SSE lifecycle per SPEC_FULL.md §6.2:
/// connected, then the current status, then every event verbatim until a
/// terminal event, followed by a short grace period before closing.
pub async fn stream(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let sse_stream = async_stream::stream! {
        let connected = json!({ "workflowId": id, "timestamp": chrono::Utc::now() });
        yield Ok(SseEvent::default().event("connected").data(connected.to_string()));

        let Some(current) = state.executor.state().get(id).await else {
            let error = json!({ "message": format!("workflow run '{id}' not found") });
            yield Ok(SseEvent::default().event("error").data(error.to_string()));
            return;
        };

        let terminal = current.status.is_terminal();
        yield Ok(SseEvent::default().event("status").data(serde_json::to_string(&current).unwrap_or_default()));
        if terminal {
            return;
        }

        let (subscription, mut receiver) = state.executor.state().subscribe(id).await;
        while let Some(event) = receiver.recv().await {
            let is_terminal = event.is_terminal();
            let name = event.sse_event_name();
            yield Ok(SseEvent::default().event(name).data(serde_json::to_string(&event).unwrap_or_default()));
            if is_terminal {
                tokio::time::sleep(Duration::from_millis(100)).await;
                break;
            }
        }
        state.executor.state().unsubscribe(id, subscription).await;
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_summary_serializes_camel_case_and_omits_missing_description() {
        let summary = WorkflowSummary {
            name: "describe-image".to_string(),
            description: None,
            step_count: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stepCount"], 2);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn submit_response_uses_camel_case_field_names() {
        let response = SubmitResponse {
            workflow_id: Uuid::nil(),
            name: "describe-image".to_string(),
            status: WorkflowState::Pending,
            status_url: "/workflow/00000000-0000-0000-0000-000000000000/status".to_string(),
            stream_url: "/workflow/00000000-0000-0000-0000-000000000000/stream".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("workflowId").is_some());
        assert!(json.get("statusUrl").is_some());
        assert!(json.get("streamUrl").is_some());
    }

    #[test]
    fn history_query_defaults_to_no_filter() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(query.status.is_none());
        assert!(query.limit.is_none());
    }

    #[test]
    fn history_query_parses_status_and_limit() {
        let query: HistoryQuery = serde_json::from_str(r#"{"status":"completed","limit":10}"#).unwrap();
        assert_eq!(query.status, Some(WorkflowState::Completed));
        assert_eq!(query.limit, Some(10));
    }
}
