//! Category-specific provider traits.
//!
//! The gateway dispatches by a tagged `Category` rather than one polymorphic
//! service interface (see `aigateway_types::llm::Category`): each arm of a
//! `match` calls a monomorphic executor over one of these traits. Text and
//! vision share a single trait (`ChatProvider`) since both move the same
//! message-list-in, chunk-stream-out shape; image/video/audio/embedding each
//! get their own typed request/response pair.
//!
//! Uses RPITIT (return-position `impl Trait` in traits) for the async
//! methods, same as the reference codebase. Classification of failures into
//! `ErrorCode` happens at the failover executor boundary, not here -- a
//! provider returns a bare `ProviderError` message.

use std::fmt;
use std::pin::Pin;

use aigateway_types::llm::{
    AudioRequest, AudioResult, ChatMessage, CompletionRequest, EmbeddingRequest, EmbeddingResult,
    ImageRequest, ImageResult, StreamEvent, VideoRequest, VideoResult,
};
use futures_util::Stream;

/// Error returned by a provider call before classification.
///
/// Deliberately not `ClassifiedError`: classification happens once, at the
/// failover executor, per SPEC_FULL.md §7 ("not reclassified afterwards").
#[derive(Debug, Clone)]
pub struct ProviderError(pub String);

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        ProviderError(s)
    }
}

impl From<&str> for ProviderError {
    fn from(s: &str) -> Self {
        ProviderError(s.to_string())
    }
}

/// A lazy, finite sequence of chunks from a text/vision provider.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Provider for the `text` and `vision` categories.
///
/// `complete` is the connection phase: it may fail (auth, rate limit, model
/// unavailable) before yielding a single chunk. Once it returns a stream,
/// mid-stream item failures surface through that stream's own `Result` items.
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<ChatStream, ProviderError>> + Send;
}

/// Provider for the `image` category.
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        request: ImageRequest,
    ) -> impl std::future::Future<Output = Result<ImageResult, ProviderError>> + Send;
}

/// Provider for the `video` category.
pub trait VideoProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        request: VideoRequest,
    ) -> impl std::future::Future<Output = Result<VideoResult, ProviderError>> + Send;
}

/// Provider for the `audio` category.
pub trait AudioProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        request: AudioRequest,
    ) -> impl std::future::Future<Output = Result<AudioResult, ProviderError>> + Send;
}

/// Provider for the `embedding` category.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> impl std::future::Future<Output = Result<EmbeddingResult, ProviderError>> + Send;
}

/// Wrap a plain string as the sole user message of a chat request. Used by
/// transformers and single-call HTTP handlers that accept a bare `prompt`.
pub fn single_user_message(content: impl Into<String>, model: Option<String>) -> CompletionRequest {
    CompletionRequest {
        model,
        messages: vec![ChatMessage::user(content)],
    }
}
