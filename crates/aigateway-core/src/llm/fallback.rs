//! Failover executor: cycle a category's registered providers with
//! exponential backoff on retryable failures (SPEC_FULL.md §4.3).
//!
//! This replaces the reference codebase's priority/circuit-breaker/cost-
//! warning `FallbackChain` with the spec's simpler algorithm: an attempted
//! set, the registry's shared rotation cursor, and exponential backoff
//! between attempts. The retry-loop *shape* -- try a provider, classify the
//! failure, continue or surface -- and the hand-rolled-mock test style are
//! kept from the reference codebase's `FallbackChain` test suite.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use aigateway_types::error::{ClassifiedError, ErrorCode, GatewayError};
use aigateway_types::llm::{Category, CompletionRequest};
use serde_json::Value;

use super::box_provider::BoxProvider;
use super::provider::ChatStream;
use super::registry::Registry;
use crate::transformers;

/// `{maxRetries, baseDelayMs, maxDelayMs}` from SPEC_FULL.md §4.3, applied
/// identically to every category.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// One executor value per category, built from the registry's current
/// provider list for that category. Per SPEC_FULL.md §4.5, a fresh
/// `FailoverExecutor` is built for each step dispatch, but the rotation
/// cursor it drives lives in `Registry` and is shared across all of them.
pub struct FailoverExecutor {
    registry: Arc<Registry>,
    category: Category,
    retry: RetryConfig,
}

impl FailoverExecutor {
    pub fn new(registry: Arc<Registry>, category: Category, retry: RetryConfig) -> Self {
        Self {
            registry,
            category,
            retry,
        }
    }

    /// Execute one logical operation against `self.category`, returning the
    /// structured JSON result and the name of the provider that produced it.
    ///
    /// For `Category::Text`/`Category::Vision`, `input` deserializes to a
    /// `CompletionRequest` and the returned stream is drained into a
    /// concatenated string before this call returns (SPEC_FULL.md §9,
    /// "stream accumulation semantics"). Use [`Self::execute_stream`] when
    /// the caller wants the raw chunk stream instead (the `/text`/`/vision`
    /// HTTP handlers).
    pub async fn execute(&self, input: Value) -> Result<(Value, String), GatewayError> {
        let total = self.registry.get_all(self.category).len();
        if total == 0 {
            return Err(GatewayError::EmptyCategory(self.category.to_string()));
        }

        let mut attempted: HashSet<String> = HashSet::new();
        let mut errors: Vec<ClassifiedError> = Vec::new();
        let mut attempt = 0usize;

        loop {
            if attempt >= self.retry.max_retries {
                break;
            }

            let provider = self.registry.get_next(self.category).map_err(GatewayError::Provider)?;
            if attempted.contains(provider.name()) && attempted.len() < total {
                tracing::debug!(provider = provider.name(), category = %self.category, "skipping already-attempted provider, others remain untried");
                continue;
            }
            attempted.insert(provider.name().to_string());

            // Field names here are the literal OTel GenAI semantic-convention
            // strings from `aigateway_observe::genai_attrs` (tracing field
            // names must be dotted-path tokens, not runtime constants).
            tracing::debug!(
                gen_ai.operation.name = aigateway_observe::genai_attrs::OP_CHAT,
                gen_ai.provider.name = provider.name(),
                category = %self.category,
                attempt,
                "invoking provider"
            );
            match invoke(&provider, input.clone()).await {
                Ok(value) => return Ok((value, provider.name().to_string())),
                Err(raw) => {
                    let classified = ClassifiedError::new(provider.name(), raw.to_string());
                    let retryable = classified.code.is_retryable();
                    tracing::warn!(
                        gen_ai.provider.name = provider.name(),
                        code = classified.code.as_str(),
                        "provider call failed"
                    );
                    errors.push(classified.clone());

                    if !retryable {
                        return Err(GatewayError::Provider(classified));
                    }

                    if attempt < self.retry.max_retries - 1 {
                        let delay_ms = self
                            .retry
                            .base_delay_ms
                            .saturating_mul(1u64 << attempt.min(62))
                            .min(self.retry.max_delay_ms);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    attempt += 1;
                }
            }
        }

        let names: Vec<&str> = attempted.iter().map(String::as_str).collect();
        Err(GatewayError::Provider(ClassifiedError::with_code(
            names.join(", "),
            format!(
                "all providers exhausted for category '{}' after {} attempt(s): {}",
                self.category,
                attempted.len(),
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            ErrorCode::ServiceError,
        )))
    }

    /// Same selection algorithm as [`Self::execute`], but for `text`/
    /// `vision` callers that want the raw chunk stream rather than a
    /// drained string (the single-call HTTP endpoints). Retries apply to
    /// the connection phase only; once a stream is handed back, mid-stream
    /// item failures are the caller's concern.
    pub async fn execute_stream(&self, request: CompletionRequest) -> Result<(ChatStream, String), GatewayError> {
        let total = self.registry.get_all(self.category).len();
        if total == 0 {
            return Err(GatewayError::EmptyCategory(self.category.to_string()));
        }

        let mut attempted: HashSet<String> = HashSet::new();
        let mut errors: Vec<ClassifiedError> = Vec::new();
        let mut attempt = 0usize;

        loop {
            if attempt >= self.retry.max_retries {
                break;
            }

            let provider = self.registry.get_next(self.category).map_err(GatewayError::Provider)?;
            if attempted.contains(provider.name()) && attempted.len() < total {
                continue;
            }
            attempted.insert(provider.name().to_string());

            let chat = match &provider {
                BoxProvider::Chat(p) => p.clone(),
                _ => {
                    return Err(GatewayError::InvalidDefinition(format!(
                        "category '{}' is not a chat category",
                        self.category
                    )))
                }
            };

            match chat.complete(request.clone()).await {
                Ok(stream) => return Ok((stream, chat.name().to_string())),
                Err(raw) => {
                    let classified = ClassifiedError::new(chat.name(), raw.to_string());
                    let retryable = classified.code.is_retryable();
                    errors.push(classified.clone());

                    if !retryable {
                        return Err(GatewayError::Provider(classified));
                    }

                    if attempt < self.retry.max_retries - 1 {
                        let delay_ms = self
                            .retry
                            .base_delay_ms
                            .saturating_mul(1u64 << attempt.min(62))
                            .min(self.retry.max_delay_ms);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    attempt += 1;
                }
            }
        }

        let names: Vec<&str> = attempted.iter().map(String::as_str).collect();
        Err(GatewayError::Provider(ClassifiedError::with_code(
            names.join(", "),
            format!(
                "all providers exhausted for category '{}' after {} attempt(s): {}",
                self.category,
                attempted.len(),
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            ErrorCode::ServiceError,
        )))
    }
}

async fn invoke(provider: &BoxProvider, input: Value) -> Result<Value, super::provider::ProviderError> {
    match provider {
        BoxProvider::Chat(p) => {
            let request: CompletionRequest = serde_json::from_value(input)
                .map_err(|e| super::provider::ProviderError(format!("invalid request: {e}")))?;
            let stream = p.complete(request).await?;
            let text = transformers::stream_to_string(stream).await?;
            Ok(Value::String(text))
        }
        BoxProvider::Image(p) => {
            let request = serde_json::from_value(input)
                .map_err(|e| super::provider::ProviderError(format!("invalid request: {e}")))?;
            let result = p.generate(request).await?;
            serde_json::to_value(result).map_err(|e| super::provider::ProviderError(e.to_string()))
        }
        BoxProvider::Video(p) => {
            let request = serde_json::from_value(input)
                .map_err(|e| super::provider::ProviderError(format!("invalid request: {e}")))?;
            let result = p.generate(request).await?;
            serde_json::to_value(result).map_err(|e| super::provider::ProviderError(e.to_string()))
        }
        BoxProvider::Audio(p) => {
            let request = serde_json::from_value(input)
                .map_err(|e| super::provider::ProviderError(format!("invalid request: {e}")))?;
            let result = p.generate(request).await?;
            serde_json::to_value(result).map_err(|e| super::provider::ProviderError(e.to_string()))
        }
        BoxProvider::Embedding(p) => {
            let request = serde_json::from_value(input)
                .map_err(|e| super::provider::ProviderError(format!("invalid request: {e}")))?;
            let result = p.embed(request).await?;
            serde_json::to_value(result).map_err(|e| super::provider::ProviderError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxChatProvider;
    use crate::llm::provider::{ChatProvider, ProviderError};
    use aigateway_types::llm::{ChatMessage, StreamEvent};
    use async_stream::stream;

    /// A deterministic mock provider: yields fixed chunks, or fails with a
    /// fixed message on the first call (then never again), matching the
    /// reference codebase's `MockProvider` test-double style.
    struct MockProvider {
        name: &'static str,
        chunks: Vec<&'static str>,
        fail_message: Option<&'static str>,
    }

    impl ChatProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<ChatStream, ProviderError> {
            if let Some(msg) = self.fail_message {
                return Err(ProviderError(msg.to_string()));
            }
            let chunks = self.chunks.clone();
            let s = stream! {
                for c in chunks {
                    yield Ok(StreamEvent::TextDelta { text: c.to_string() });
                }
                yield Ok(StreamEvent::Done);
            };
            Ok(Box::pin(s))
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: None,
            messages: vec![ChatMessage::user("hi")],
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn single_provider_happy_path() {
        let registry = Arc::new(Registry::new());
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "A",
                chunks: vec!["hel", "lo"],
                fail_message: None,
            })),
        );
        let executor = FailoverExecutor::new(registry, Category::Text, fast_retry());
        let (result, service) = executor
            .execute(serde_json::to_value(request()).unwrap())
            .await
            .unwrap();
        assert_eq!(result, Value::String("hello".to_string()));
        assert_eq!(service, "A");
    }

    #[tokio::test]
    async fn fails_over_to_next_provider_on_retryable_error() {
        let registry = Arc::new(Registry::new());
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "A",
                chunks: vec![],
                fail_message: Some("429 rate limited"),
            })),
        );
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "B",
                chunks: vec!["ok"],
                fail_message: None,
            })),
        );
        let executor = FailoverExecutor::new(registry, Category::Text, fast_retry());
        let (result, service) = executor
            .execute(serde_json::to_value(request()).unwrap())
            .await
            .unwrap();
        assert_eq!(result, Value::String("ok".to_string()));
        assert_eq!(service, "B");
    }

    #[tokio::test]
    async fn fatal_error_stops_without_trying_next_provider() {
        let registry = Arc::new(Registry::new());
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "A",
                chunks: vec![],
                fail_message: Some("Invalid API key"),
            })),
        );
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "B",
                chunks: vec!["should not run"],
                fail_message: None,
            })),
        );
        let executor = FailoverExecutor::new(registry, Category::Text, fast_retry());
        let err = executor
            .execute(serde_json::to_value(request()).unwrap())
            .await
            .unwrap_err();
        match err {
            GatewayError::Provider(e) => {
                assert_eq!(e.code, ErrorCode::AuthFailed);
                assert_eq!(e.service, "A");
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_category_is_service_error_with_no_attempts() {
        let registry = Arc::new(Registry::new());
        let executor = FailoverExecutor::new(registry, Category::Text, fast_retry());
        let err = executor
            .execute(serde_json::to_value(request()).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::ServiceError));
    }

    #[tokio::test]
    async fn exhausting_retries_reports_all_attempted_providers() {
        let registry = Arc::new(Registry::new());
        registry.register(
            Category::Text,
            BoxProvider::Chat(BoxChatProvider::new(MockProvider {
                name: "A",
                chunks: vec![],
                fail_message: Some("503 overloaded"),
            })),
        );
        let executor = FailoverExecutor::new(
            registry,
            Category::Text,
            RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        );
        let err = executor
            .execute(serde_json::to_value(request()).unwrap())
            .await
            .unwrap_err();
        match err {
            GatewayError::Provider(e) => {
                assert_eq!(e.code, ErrorCode::ServiceError);
                assert_eq!(e.service, "A");
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }
}
