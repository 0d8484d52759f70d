//! Single-call category endpoints: `/text`, `/chat`, `/vision` (streaming)
//! and `/image`, `/video`, `/audio` (JSON) (SPEC_FULL.md §6.1, §11).
//!
//! Thin wrappers over [`FailoverExecutor`] -- no workflow, no persisted
//! status, just one dispatch to the category's provider pool.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aigateway_core::llm::fallback::FailoverExecutor;
use aigateway_core::llm::provider::single_user_message;
use aigateway_types::llm::{
    AudioRequest, Category, ChatMessage, CompletionRequest, ImageRequest, StreamEvent, VideoRequest,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Shared body shape for `/text`, `/chat`, `/vision`: either a prebuilt
/// `messages` array or a bare `prompt` string, per SPEC_FULL.md §11.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatBody {
    fn into_request(self) -> Result<CompletionRequest, AppError> {
        match (self.messages, self.prompt) {
            (Some(messages), _) if !messages.is_empty() => Ok(CompletionRequest {
                model: self.model,
                messages,
            }),
            (_, Some(prompt)) => Ok(single_user_message(prompt, self.model)),
            _ => Err(AppError::InvalidRequest(
                "expected a non-empty 'messages' array or a 'prompt' string".to_string(),
            )),
        }
    }
}

async fn stream_category(state: AppState, category: Category, request: CompletionRequest) -> Result<Response, AppError> {
    let executor = FailoverExecutor::new(state.registry.clone(), category, Default::default());
    let (stream, service) = executor.execute_stream(request).await?;

    let body_stream = stream.filter_map(|item| async move {
        match item {
            Ok(StreamEvent::TextDelta { text }) => Some(Ok::<_, std::io::Error>(text)),
            Ok(StreamEvent::Connected | StreamEvent::Usage { .. } | StreamEvent::Done) => None,
            Err(e) => {
                tracing::warn!(error = %e, "chat stream terminated early");
                None
            }
        }
    });

    let mut response = Response::new(Body::from_stream(body_stream));
    response
        .headers_mut()
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
        .headers_mut()
        .insert("X-AI-Service", HeaderValue::from_str(&service).unwrap_or(HeaderValue::from_static("unknown")));
    Ok(response)
}

/// `POST /text`, `POST /chat`.
pub async fn text(State(state): State<AppState>, _auth: Authenticated, Json(body): Json<ChatBody>) -> Result<Response, AppError> {
    let request = body.into_request()?;
    stream_category(state, Category::Text, request).await
}

/// `POST /vision`.
pub async fn vision(State(state): State<AppState>, _auth: Authenticated, Json(body): Json<ChatBody>) -> Result<Response, AppError> {
    let request = body.into_request()?;
    if !request.messages.iter().any(|m| m.image_url.is_some()) {
        return Err(AppError::InvalidRequest(
            "vision requests require at least one message carrying an image_url".to_string(),
        ));
    }
    stream_category(state, Category::Vision, request).await
}

#[derive(Debug, Serialize)]
struct CategoryResult {
    #[serde(flatten)]
    result: Value,
    service: String,
}

async fn call_json_category(state: &AppState, category: Category, input: Value) -> Result<(StatusCode, Json<CategoryResult>), AppError> {
    let executor = FailoverExecutor::new(state.registry.clone(), category, Default::default());
    let (result, service) = executor.execute(input).await?;
    Ok((StatusCode::OK, Json(CategoryResult { result, service })))
}

/// `POST /image`.
pub async fn image(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<ImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = serde_json::to_value(body).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    call_json_category(&state, Category::Image, input).await
}

/// `POST /video`.
pub async fn video(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<VideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = serde_json::to_value(body).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    call_json_category(&state, Category::Video, input).await
}

/// `POST /audio`.
pub async fn audio(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<AudioRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = serde_json::to_value(body).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    call_json_category(&state, Category::Audio, input).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_prefers_messages_over_prompt() {
        let body = ChatBody {
            messages: Some(vec![ChatMessage::user("hi")]),
            prompt: Some("ignored".to_string()),
            model: None,
        };
        let request = body.into_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "hi");
    }

    #[test]
    fn chat_body_falls_back_to_prompt() {
        let body = ChatBody {
            messages: None,
            prompt: Some("a prompt".to_string()),
            model: None,
        };
        let request = body.into_request().unwrap();
        assert_eq!(request.messages[0].content, "a prompt");
    }

    #[test]
    fn chat_body_rejects_empty_input() {
        let body = ChatBody {
            messages: None,
            prompt: None,
            model: None,
        };
        assert!(body.into_request().is_err());
    }
}
