//! Pure input/output shaping functions threading data between workflow
//! steps (SPEC_FULL.md §4.6).
//!
//! Grounded on the reference codebase's `workflow/context.rs`, which also
//! centralizes "pull a prior value and reshape it" helpers, though there
//! they resolve `{{ steps.x.output }}` templates rather than reading a
//! typed, index-keyed context. These are plain functions, not methods on
//! `WorkflowContext`, so a `WorkflowDefinition::step` can reference them
//! directly as `Box<dyn Fn(&Value, &WorkflowContext) -> Result<Value, GatewayError>>`.

use aigateway_types::error::GatewayError;
use aigateway_types::llm::{ChatMessage, CompletionRequest};
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::llm::provider::{ChatStream, ProviderError};
use crate::workflow::context::WorkflowContext;

/// Drain a provider's chunk stream into one concatenated string.
///
/// Used both by the workflow driver to finalize a text/vision step's
/// result and, via [`crate::llm::fallback::FailoverExecutor::execute`], by
/// the single-call `/text` and `/vision` JSON (non-streaming) paths.
pub async fn stream_to_string(mut stream: ChatStream) -> Result<String, ProviderError> {
    let mut out = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            aigateway_types::llm::StreamEvent::TextDelta { text } => out.push_str(&text),
            aigateway_types::llm::StreamEvent::Connected
            | aigateway_types::llm::StreamEvent::Usage { .. }
            | aigateway_types::llm::StreamEvent::Done => {}
        }
    }
    Ok(out)
}

/// Accept a plain string (wrapped as a single user message) or an object
/// already carrying a `messages` array; reject anything else.
pub fn input_to_chat_messages(input: &Value, _ctx: &WorkflowContext) -> Result<Value, GatewayError> {
    let request = match input {
        Value::String(s) => CompletionRequest {
            model: None,
            messages: vec![ChatMessage::user(s.clone())],
        },
        Value::Object(_) if input.get("messages").is_some() => {
            serde_json::from_value(input.clone())
                .map_err(|e| GatewayError::InvalidDefinition(format!("invalid chat input: {e}")))?
        }
        other => {
            return Err(GatewayError::InvalidDefinition(format!(
                "expected a string or an object with a 'messages' array, got {other}"
            )))
        }
    };
    serde_json::to_value(request).map_err(|e| GatewayError::InvalidDefinition(e.to_string()))
}

/// Accept a plain string (used as `prompt`) or an object already carrying
/// a `prompt` field; reject anything else.
pub fn input_to_image_input(input: &Value, _ctx: &WorkflowContext) -> Result<Value, GatewayError> {
    let prompt = match input {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("prompt").and_then(Value::as_str) {
            Some(p) => p.to_string(),
            None => {
                return Err(GatewayError::InvalidDefinition(
                    "expected a string or an object with a 'prompt' field".to_string(),
                ))
            }
        },
        other => {
            return Err(GatewayError::InvalidDefinition(format!(
                "expected a string or an object with a 'prompt' field, got {other}"
            )))
        }
    };
    Ok(json!({ "prompt": prompt }))
}

/// Pull the immediately previous step's string result and use it as the
/// image prompt. Fails loudly if there is no previous step or its result
/// is not a string.
pub fn previous_text_to_image_input(_input: &Value, ctx: &WorkflowContext) -> Result<Value, GatewayError> {
    let prompt = previous_string_result(ctx, "previousTextToImageInput")?;
    Ok(json!({ "prompt": prompt }))
}

/// Pull the immediately previous step's string result and use it as audio
/// input text. Fails loudly if there is no previous step or its result is
/// not a string.
pub fn previous_text_to_audio_input(_input: &Value, ctx: &WorkflowContext) -> Result<Value, GatewayError> {
    let text = previous_string_result(ctx, "previousTextToAudioInput")?;
    Ok(json!({ "input": text }))
}

/// Build a `previousImageToVisionInput(prompt)` transformer: pulls the
/// immediately previous step's image result, takes its first URL, and
/// assembles a single vision message pairing that image with `prompt`.
pub fn previous_image_to_vision_input(
    prompt: impl Into<String>,
) -> impl Fn(&Value, &WorkflowContext) -> Result<Value, GatewayError> {
    let prompt = prompt.into();
    move |_input, ctx| {
        let previous = ctx.previous_result().ok_or_else(|| {
            GatewayError::InvalidDefinition("previousImageToVisionInput: no previous step result".to_string())
        })?;
        let url = previous
            .get("urls")
            .and_then(Value::as_array)
            .and_then(|urls| urls.first())
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::InvalidDefinition(
                    "previousImageToVisionInput: previous step result has no image urls".to_string(),
                )
            })?;
        let request = CompletionRequest {
            model: None,
            messages: vec![ChatMessage::user_with_image(prompt.clone(), url)],
        };
        serde_json::to_value(request).map_err(|e| GatewayError::InvalidDefinition(e.to_string()))
    }
}

fn previous_string_result(ctx: &WorkflowContext, transformer_name: &str) -> Result<String, GatewayError> {
    let previous = ctx.previous_result().ok_or_else(|| {
        GatewayError::InvalidDefinition(format!("{transformer_name}: no previous step result"))
    })?;
    previous
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidDefinition(format!("{transformer_name}: previous step result is not a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::WorkflowContext;
    use aigateway_types::llm::StreamEvent;
    use async_stream::stream;
    use uuid::Uuid;

    fn ctx_with_results(results: Vec<Value>) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(Uuid::now_v7(), "wf".to_string(), Value::Null);
        for (i, r) in results.into_iter().enumerate() {
            ctx.set_result(i, None, r);
        }
        ctx
    }

    #[tokio::test]
    async fn stream_to_string_concatenates_text_deltas() {
        let s = stream! {
            yield Ok(StreamEvent::Connected);
            yield Ok(StreamEvent::TextDelta { text: "hel".to_string() });
            yield Ok(StreamEvent::TextDelta { text: "lo".to_string() });
            yield Ok(StreamEvent::Done);
        };
        let result = stream_to_string(Box::pin(s)).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[test]
    fn input_to_chat_messages_wraps_plain_string() {
        let ctx = ctx_with_results(vec![]);
        let value = input_to_chat_messages(&json!("hi there"), &ctx).unwrap();
        assert_eq!(value["messages"][0]["content"], "hi there");
    }

    #[test]
    fn input_to_chat_messages_rejects_non_string_non_messages() {
        let ctx = ctx_with_results(vec![]);
        assert!(input_to_chat_messages(&json!({"foo": "bar"}), &ctx).is_err());
        assert!(input_to_chat_messages(&json!(42), &ctx).is_err());
    }

    #[test]
    fn input_to_image_input_accepts_string_or_prompt_object() {
        let ctx = ctx_with_results(vec![]);
        assert_eq!(input_to_image_input(&json!("a cat"), &ctx).unwrap()["prompt"], "a cat");
        assert_eq!(
            input_to_image_input(&json!({"prompt": "a dog"}), &ctx).unwrap()["prompt"],
            "a dog"
        );
        assert!(input_to_image_input(&json!({"no_prompt": true}), &ctx).is_err());
    }

    #[test]
    fn previous_text_to_image_input_pulls_prior_string_result() {
        let ctx = ctx_with_results(vec![json!("a sunset over water")]);
        let value = previous_text_to_image_input(&Value::Null, &ctx).unwrap();
        assert_eq!(value["prompt"], "a sunset over water");
    }

    #[test]
    fn previous_text_to_image_input_fails_without_previous_step() {
        let ctx = ctx_with_results(vec![]);
        assert!(previous_text_to_image_input(&Value::Null, &ctx).is_err());
    }

    #[test]
    fn previous_image_to_vision_input_builds_vision_message() {
        let ctx = ctx_with_results(vec![json!({"urls": ["https://example.com/a.png"]})]);
        let transformer = previous_image_to_vision_input("describe this");
        let value = transformer(&Value::Null, &ctx).unwrap();
        assert_eq!(value["messages"][0]["content"], "describe this");
        assert_eq!(value["messages"][0]["image_url"], "https://example.com/a.png");
    }

    #[test]
    fn previous_image_to_vision_input_fails_without_urls() {
        let ctx = ctx_with_results(vec![json!({"urls": []})]);
        let transformer = previous_image_to_vision_input("describe this");
        assert!(transformer(&Value::Null, &ctx).is_err());
    }
}
