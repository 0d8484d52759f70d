//! Thin reqwest-based provider adapters for the image/video/audio/embedding
//! categories.
//!
//! Unlike `openai_compat`, these categories have no single dominant wire
//! protocol worth modeling with a typed client crate -- per SPEC_FULL.md
//! §1, "per-provider adapter HTTP calls are thin functions that yield a
//! result or a chunk stream; their wire formats are not specified beyond
//! the shape of the category result types." Each adapter here POSTs a JSON
//! body to a configured endpoint and deserializes the category result type
//! directly out of the response body, trusting the configured endpoint to
//! speak that shape.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use aigateway_core::llm::provider::{AudioProvider, EmbeddingProvider, ImageProvider, ProviderError, VideoProvider};
use aigateway_types::llm::{
    AudioRequest, AudioResult, EmbeddingRequest, EmbeddingResult, ImageRequest, ImageResult,
    VideoRequest, VideoResult,
};

/// Shared HTTP-adapter plumbing: a named endpoint plus bearer token.
struct HttpEndpoint {
    provider_name: String,
    url: String,
    api_key: SecretString,
    client: Client,
}

impl HttpEndpoint {
    fn new(provider_name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            url: url.into(),
            api_key: SecretString::from(api_key.into()),
            client: Client::new(),
        }
    }

    async fn post_json<Req: serde::Serialize, Res: serde::de::DeserializeOwned>(
        &self,
        body: &Req,
    ) -> Result<Res, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError(format!("{}: {e}", self.provider_name)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError(format!(
                "{}: {status} {text}",
                self.provider_name
            )));
        }

        response
            .json::<Res>()
            .await
            .map_err(|e| ProviderError(format!("{}: malformed response: {e}", self.provider_name)))
    }
}

/// Generic image-generation provider POSTing an [`ImageRequest`] and
/// expecting back an [`ImageResult`].
pub struct HttpImageProvider(HttpEndpoint);

impl HttpImageProvider {
    pub fn new(provider_name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self(HttpEndpoint::new(provider_name, url, api_key))
    }
}

impl ImageProvider for HttpImageProvider {
    fn name(&self) -> &str {
        &self.0.provider_name
    }

    async fn generate(&self, request: ImageRequest) -> Result<ImageResult, ProviderError> {
        self.0.post_json(&request).await
    }
}

/// Generic video-generation provider POSTing a [`VideoRequest`] and
/// expecting back a [`VideoResult`].
pub struct HttpVideoProvider(HttpEndpoint);

impl HttpVideoProvider {
    pub fn new(provider_name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self(HttpEndpoint::new(provider_name, url, api_key))
    }
}

impl VideoProvider for HttpVideoProvider {
    fn name(&self) -> &str {
        &self.0.provider_name
    }

    async fn generate(&self, request: VideoRequest) -> Result<VideoResult, ProviderError> {
        self.0.post_json(&request).await
    }
}

/// Generic audio-generation provider POSTing an [`AudioRequest`] and
/// expecting back an [`AudioResult`].
pub struct HttpAudioProvider(HttpEndpoint);

impl HttpAudioProvider {
    pub fn new(provider_name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self(HttpEndpoint::new(provider_name, url, api_key))
    }
}

impl AudioProvider for HttpAudioProvider {
    fn name(&self) -> &str {
        &self.0.provider_name
    }

    async fn generate(&self, request: AudioRequest) -> Result<AudioResult, ProviderError> {
        self.0.post_json(&request).await
    }
}

/// Generic embedding provider POSTing an [`EmbeddingRequest`] and
/// expecting back an [`EmbeddingResult`].
pub struct HttpEmbeddingProvider(HttpEndpoint);

impl HttpEmbeddingProvider {
    pub fn new(provider_name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self(HttpEndpoint::new(provider_name, url, api_key))
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.0.provider_name
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResult, ProviderError> {
        self.0.post_json(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_report_their_configured_name() {
        let image = HttpImageProvider::new("stability", "https://example.com/image", "key");
        assert_eq!(image.name(), "stability");

        let video = HttpVideoProvider::new("runway", "https://example.com/video", "key");
        assert_eq!(video.name(), "runway");

        let audio = HttpAudioProvider::new("elevenlabs", "https://example.com/audio", "key");
        assert_eq!(audio.name(), "elevenlabs");

        let embedding = HttpEmbeddingProvider::new("openai", "https://example.com/embed", "key");
        assert_eq!(embedding.name(), "openai");
    }

    #[tokio::test]
    async fn image_provider_surfaces_non_success_status_as_provider_error() {
        let image = HttpImageProvider::new("stability", "http://127.0.0.1:1", "key");
        let result = image
            .generate(ImageRequest { prompt: "a cube".into(), options: None })
            .await;
        assert!(result.is_err());
    }
}
