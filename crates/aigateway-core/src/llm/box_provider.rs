//! Object-safe shims over the category provider traits.
//!
//! RPITIT traits (`ChatProvider`, `ImageProvider`, ...) are not object-safe,
//! so the registry can't store `Vec<Box<dyn ChatProvider>>` directly. Each
//! trait gets a `*Dyn` shim with boxed-future signatures, a blanket impl
//! bridging the two, and a `Box*Provider` wrapper -- same pattern the
//! reference codebase uses for `BoxLlmProvider`. These wrap an `Arc` rather
//! than a `Box`: the registry hands out cheap clones of the selected
//! provider so a failover attempt never runs while holding the registry's
//! shard lock.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aigateway_types::llm::{
    AudioRequest, AudioResult, CompletionRequest, EmbeddingRequest, EmbeddingResult, ImageRequest,
    ImageResult, VideoRequest, VideoResult,
};

use super::provider::{
    AudioProvider, ChatProvider, ChatStream, EmbeddingProvider, ImageProvider, ProviderError,
    VideoProvider,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// ChatProvider (text, vision)
// ---------------------------------------------------------------------------

pub trait ChatProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn complete_boxed(&self, request: CompletionRequest) -> BoxFuture<'_, Result<ChatStream, ProviderError>>;
}

impl<T: ChatProvider> ChatProviderDyn for T {
    fn name(&self) -> &str {
        ChatProvider::name(self)
    }

    fn complete_boxed(&self, request: CompletionRequest) -> BoxFuture<'_, Result<ChatStream, ProviderError>> {
        Box::pin(self.complete(request))
    }
}

#[derive(Clone)]
pub struct BoxChatProvider(Arc<dyn ChatProviderDyn>);

impl BoxChatProvider {
    pub fn new(provider: impl ChatProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<ChatStream, ProviderError> {
        self.0.complete_boxed(request).await
    }
}

// ---------------------------------------------------------------------------
// ImageProvider
// ---------------------------------------------------------------------------

pub trait ImageProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn generate_boxed(&self, request: ImageRequest) -> BoxFuture<'_, Result<ImageResult, ProviderError>>;
}

impl<T: ImageProvider> ImageProviderDyn for T {
    fn name(&self) -> &str {
        ImageProvider::name(self)
    }

    fn generate_boxed(&self, request: ImageRequest) -> BoxFuture<'_, Result<ImageResult, ProviderError>> {
        Box::pin(self.generate(request))
    }
}

#[derive(Clone)]
pub struct BoxImageProvider(Arc<dyn ImageProviderDyn>);

impl BoxImageProvider {
    pub fn new(provider: impl ImageProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn generate(&self, request: ImageRequest) -> Result<ImageResult, ProviderError> {
        self.0.generate_boxed(request).await
    }
}

// ---------------------------------------------------------------------------
// VideoProvider
// ---------------------------------------------------------------------------

pub trait VideoProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn generate_boxed(&self, request: VideoRequest) -> BoxFuture<'_, Result<VideoResult, ProviderError>>;
}

impl<T: VideoProvider> VideoProviderDyn for T {
    fn name(&self) -> &str {
        VideoProvider::name(self)
    }

    fn generate_boxed(&self, request: VideoRequest) -> BoxFuture<'_, Result<VideoResult, ProviderError>> {
        Box::pin(self.generate(request))
    }
}

#[derive(Clone)]
pub struct BoxVideoProvider(Arc<dyn VideoProviderDyn>);

impl BoxVideoProvider {
    pub fn new(provider: impl VideoProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn generate(&self, request: VideoRequest) -> Result<VideoResult, ProviderError> {
        self.0.generate_boxed(request).await
    }
}

// ---------------------------------------------------------------------------
// AudioProvider
// ---------------------------------------------------------------------------

pub trait AudioProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn generate_boxed(&self, request: AudioRequest) -> BoxFuture<'_, Result<AudioResult, ProviderError>>;
}

impl<T: AudioProvider> AudioProviderDyn for T {
    fn name(&self) -> &str {
        AudioProvider::name(self)
    }

    fn generate_boxed(&self, request: AudioRequest) -> BoxFuture<'_, Result<AudioResult, ProviderError>> {
        Box::pin(self.generate(request))
    }
}

#[derive(Clone)]
pub struct BoxAudioProvider(Arc<dyn AudioProviderDyn>);

impl BoxAudioProvider {
    pub fn new(provider: impl AudioProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn generate(&self, request: AudioRequest) -> Result<AudioResult, ProviderError> {
        self.0.generate_boxed(request).await
    }
}

// ---------------------------------------------------------------------------
// EmbeddingProvider
// ---------------------------------------------------------------------------

pub trait EmbeddingProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn embed_boxed(&self, request: EmbeddingRequest) -> BoxFuture<'_, Result<EmbeddingResult, ProviderError>>;
}

impl<T: EmbeddingProvider> EmbeddingProviderDyn for T {
    fn name(&self) -> &str {
        EmbeddingProvider::name(self)
    }

    fn embed_boxed(&self, request: EmbeddingRequest) -> BoxFuture<'_, Result<EmbeddingResult, ProviderError>> {
        Box::pin(self.embed(request))
    }
}

#[derive(Clone)]
pub struct BoxEmbeddingProvider(Arc<dyn EmbeddingProviderDyn>);

impl BoxEmbeddingProvider {
    pub fn new(provider: impl EmbeddingProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResult, ProviderError> {
        self.0.embed_boxed(request).await
    }
}

// ---------------------------------------------------------------------------
// BoxProvider: the registry's homogeneous storage unit
// ---------------------------------------------------------------------------

/// One registered provider, tagged by which category trait it implements.
/// A single registry slot (one `Category`) only ever holds one variant.
#[derive(Clone)]
pub enum BoxProvider {
    Chat(BoxChatProvider),
    Image(BoxImageProvider),
    Video(BoxVideoProvider),
    Audio(BoxAudioProvider),
    Embedding(BoxEmbeddingProvider),
}

impl BoxProvider {
    pub fn name(&self) -> &str {
        match self {
            BoxProvider::Chat(p) => p.name(),
            BoxProvider::Image(p) => p.name(),
            BoxProvider::Video(p) => p.name(),
            BoxProvider::Audio(p) => p.name(),
            BoxProvider::Embedding(p) => p.name(),
        }
    }
}
