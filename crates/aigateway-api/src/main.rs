//! AI gateway server entry point.
//!
//! Loads configuration from the environment, wires up the provider
//! registry, the workflow state backend, and the workflow executor, then
//! serves the HTTP surface until `Ctrl+C` or `SIGTERM`.

mod http;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use aigateway_core::llm::box_provider::{
    BoxAudioProvider, BoxChatProvider, BoxEmbeddingProvider, BoxImageProvider, BoxProvider, BoxVideoProvider,
};
use aigateway_core::llm::provider::ChatProvider;
use aigateway_core::llm::registry::Registry;
use aigateway_core::state::{InMemoryStateManager, StateManager};
use aigateway_core::workflow::definition::{Step, WorkflowDefinition, WorkflowDefinitionBuilder};
use aigateway_core::workflow::executor::{WorkflowExecutor, WorkflowExecutorConfig};
use aigateway_core::transformers;
use aigateway_infra::kv::ExternalKvStateManager;
use aigateway_infra::llm::image_video_audio::{HttpAudioProvider, HttpEmbeddingProvider, HttpImageProvider, HttpVideoProvider};
use aigateway_infra::llm::openai_compat::OpenAiCompatibleProvider;
use aigateway_types::llm::Category;
use secrecy::ExposeSecret;

use state::{AnyStateManager, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let enable_otel = std::env::var("AIGATEWAY_OTEL").is_ok();
    aigateway_observe::tracing_setup::init_tracing(enable_otel).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let config = Arc::new(aigateway_infra::config::load_from_env());

    let registry = Arc::new(Registry::new());
    register_providers(&registry);

    let state_manager = if config.uses_external_kv() {
        let url = config.kv_url.clone().expect("uses_external_kv implies kv_url is set");
        let token = config
            .kv_token
            .as_ref()
            .expect("uses_external_kv implies kv_token is set")
            .expose_secret()
            .to_string();
        tracing::info!(url = %url, "using external key-value state backend");
        Arc::new(AnyStateManager::ExternalKv(ExternalKvStateManager::new(
            url,
            token,
            config.workflow_result_ttl_seconds,
        )))
    } else {
        tracing::info!("using in-memory state backend");
        let manager = InMemoryStateManager::new(config.workflow_result_ttl_seconds);
        Arc::new(AnyStateManager::InMemory(manager))
    };

    // Periodic sweep of expired terminal records (SPEC_FULL.md §4.4), spun
    // here rather than via `InMemoryStateManager::spawn_cleanup_task` since
    // `state_manager` is wrapped in `AnyStateManager` by this point; both
    // backends implement `cleanup` through the same `StateManager` trait.
    {
        let state_manager = state_manager.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                state_manager.cleanup().await;
            }
        });
    }

    let executor = WorkflowExecutor::new(state_manager, registry.clone(), WorkflowExecutorConfig::from(config.as_ref()));

    let workflows = builtin_workflows(config.workflow_total_timeout_ms);

    let app_state = AppState::new(config.clone(), registry, executor, workflows);
    let router = http::router::build_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "aigateway listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("aigateway stopped");
    aigateway_observe::tracing_setup::shutdown_tracing();
    Ok(())
}

/// Registers every category's providers from environment-supplied
/// credentials. A provider is skipped if its API key/URL env var is unset
/// -- the registry then simply has no providers for that category, and a
/// request to it fails with `EmptyCategory`.
fn register_providers(registry: &Registry) {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        register_chat(registry, Category::Text, OpenAiCompatibleProvider::openai(&key, &model));
    }
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        register_chat(registry, Category::Text, OpenAiCompatibleProvider::gemini(&key, &model));
        register_chat(registry, Category::Vision, OpenAiCompatibleProvider::gemini(&key, &model));
    }
    if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
        let model = std::env::var("MISTRAL_MODEL").unwrap_or_else(|_| "mistral-large-latest".to_string());
        register_chat(registry, Category::Text, OpenAiCompatibleProvider::mistral(&key, &model));
    }
    if let Ok(key) = std::env::var("GLM_API_KEY") {
        let model = std::env::var("GLM_MODEL").unwrap_or_else(|_| "glm-4".to_string());
        register_chat(registry, Category::Text, OpenAiCompatibleProvider::glm(&key, &model));
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let model = std::env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        register_chat(registry, Category::Vision, OpenAiCompatibleProvider::openai(&key, &model));
    }

    if let (Ok(url), Ok(key)) = (std::env::var("IMAGE_PROVIDER_URL"), std::env::var("IMAGE_PROVIDER_API_KEY")) {
        let name = std::env::var("IMAGE_PROVIDER_NAME").unwrap_or_else(|_| "image-provider".to_string());
        registry.register(Category::Image, BoxProvider::Image(BoxImageProvider::new(HttpImageProvider::new(name, url, key))));
    }
    if let (Ok(url), Ok(key)) = (std::env::var("VIDEO_PROVIDER_URL"), std::env::var("VIDEO_PROVIDER_API_KEY")) {
        let name = std::env::var("VIDEO_PROVIDER_NAME").unwrap_or_else(|_| "video-provider".to_string());
        registry.register(Category::Video, BoxProvider::Video(BoxVideoProvider::new(HttpVideoProvider::new(name, url, key))));
    }
    if let (Ok(url), Ok(key)) = (std::env::var("AUDIO_PROVIDER_URL"), std::env::var("AUDIO_PROVIDER_API_KEY")) {
        let name = std::env::var("AUDIO_PROVIDER_NAME").unwrap_or_else(|_| "audio-provider".to_string());
        registry.register(Category::Audio, BoxProvider::Audio(BoxAudioProvider::new(HttpAudioProvider::new(name, url, key))));
    }
    if let (Ok(url), Ok(key)) = (std::env::var("EMBEDDING_PROVIDER_URL"), std::env::var("EMBEDDING_PROVIDER_API_KEY")) {
        let name = std::env::var("EMBEDDING_PROVIDER_NAME").unwrap_or_else(|_| "embedding-provider".to_string());
        registry.register(
            Category::Embedding,
            BoxProvider::Embedding(BoxEmbeddingProvider::new(HttpEmbeddingProvider::new(name, url, key))),
        );
    }

    for category in registry.get_categories() {
        tracing::info!(%category, "registered providers for category");
    }
}

fn register_chat(registry: &Registry, category: Category, provider: impl ChatProvider + 'static) {
    registry.register(category, BoxProvider::Chat(BoxChatProvider::new(provider)));
}

/// Workflow definitions the gateway ships with. None are hardcoded by the
/// protocol -- operators are expected to extend this list with their own
/// multi-step pipelines; these two demonstrate the shape.
fn builtin_workflows(default_total_timeout_ms: u64) -> HashMap<String, Arc<WorkflowDefinition>> {
    let mut workflows = HashMap::new();

    let describe_image: Arc<WorkflowDefinition> = Arc::new(
        WorkflowDefinitionBuilder::new("describe-image")
            .description("Generate an image, then describe it back in text")
            .total_timeout_ms(default_total_timeout_ms)
            .step(Step::transform("generate", Category::Image, transformers::input_to_image_input))
            .step(Step::transform(
                "describe",
                Category::Vision,
                transformers::previous_image_to_vision_input("Describe this image in detail."),
            ))
            .build()
            .expect("describe-image has at least one step"),
    );
    workflows.insert(describe_image.name.clone(), describe_image);

    let narrate_image: Arc<WorkflowDefinition> = Arc::new(
        WorkflowDefinitionBuilder::new("narrate-image")
            .description("Generate an image, then narrate it as speech")
            .total_timeout_ms(default_total_timeout_ms)
            .step(Step::transform("generate", Category::Image, transformers::input_to_image_input))
            .step(Step::transform(
                "caption",
                Category::Vision,
                transformers::previous_image_to_vision_input("Write a short, vivid one-sentence caption for this image."),
            ))
            .step(Step::transform("narrate", Category::Audio, transformers::previous_text_to_audio_input))
            .build()
            .expect("narrate-image has at least one step"),
    );
    workflows.insert(narrate_image.name.clone(), narrate_image);

    workflows
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
