//! Axum router configuration with middleware (SPEC_FULL.md §11).
//!
//! A flat route table rather than the reference codebase's `/api/v1`
//! nesting: `GET /` is unauthenticated and reports status, every other
//! route requires a bearer token when `API_KEY` is configured (enforced
//! per-handler via the [`Authenticated`](crate::http::extractors::auth::Authenticated)
//! extractor, not a blanket middleware layer, so `GET /` can opt out).

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers::{completion, workflow};
use crate::state::AppState;

/// Build the complete router with all routes and ambient middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status))
        .route("/text", post(completion::text))
        .route("/chat", post(completion::text))
        .route("/vision", post(completion::vision))
        .route("/image", post(completion::image))
        .route("/video", post(completion::video))
        .route("/audio", post(completion::audio))
        .route("/workflow", get(workflow::list_workflows))
        .route("/workflow/history", get(workflow::history))
        .route("/workflow/{name}", post(workflow::submit))
        .route("/workflow/{id}/status", get(workflow::status))
        .route("/workflow/{id}/stream", get(workflow::stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /` → `{status: "ok", categories: [...], workflows: [...]}`, the one
/// unauthenticated route (SPEC_FULL.md §11).
async fn status(axum::extract::State(state): axum::extract::State<AppState>) -> axum::Json<serde_json::Value> {
    let mut categories: Vec<String> = state.registry.get_categories().iter().map(ToString::to_string).collect();
    categories.sort();

    let mut workflows: Vec<&String> = state.workflows.keys().collect();
    workflows.sort();

    axum::Json(serde_json::json!({
        "status": "ok",
        "categories": categories,
        "workflows": workflows,
    }))
}
