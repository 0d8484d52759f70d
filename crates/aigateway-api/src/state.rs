//! Application state shared across every handler.
//!
//! Grounded on the reference codebase's `AppState`: a small set of
//! long-lived services constructed once at startup and handed to the
//! router as `axum::extract::State`. Per SPEC_FULL.md §9 ("Global
//! singletons"), the registry, state manager, and executor are explicit
//! `Arc`-wrapped values owned by the entry point rather than process-wide
//! statics.

use std::collections::HashMap;
use std::sync::Arc;

use aigateway_core::event::SubscriptionId;
use aigateway_core::llm::registry::Registry;
use aigateway_core::state::{InMemoryStateManager, ListFilter, StateError, StateManager};
use aigateway_core::workflow::definition::WorkflowDefinition;
use aigateway_core::workflow::executor::WorkflowExecutor;
use aigateway_infra::kv::ExternalKvStateManager;
use aigateway_types::config::GatewayConfig;
use aigateway_types::event::Event;
use aigateway_types::workflow::WorkflowStatus;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unifies the two [`StateManager`] backends behind one concrete type.
///
/// `StateManager` uses RPITIT async methods and so isn't object-safe;
/// `WorkflowExecutor<S>` and the router both need a single concrete `S`,
/// so this enum delegates to whichever backend `GatewayConfig` selected
/// rather than boxing a trait object.
pub enum AnyStateManager {
    InMemory(InMemoryStateManager),
    ExternalKv(ExternalKvStateManager),
}

impl StateManager for AnyStateManager {
    async fn create(&self, status: WorkflowStatus) -> Result<(), StateError> {
        match self {
            AnyStateManager::InMemory(s) => s.create(status).await,
            AnyStateManager::ExternalKv(s) => s.create(status).await,
        }
    }

    async fn get(&self, id: Uuid) -> Option<WorkflowStatus> {
        match self {
            AnyStateManager::InMemory(s) => s.get(id).await,
            AnyStateManager::ExternalKv(s) => s.get(id).await,
        }
    }

    async fn update(&self, id: Uuid, mutate: Box<dyn FnOnce(&mut WorkflowStatus) + Send>) {
        match self {
            AnyStateManager::InMemory(s) => s.update(id, mutate).await,
            AnyStateManager::ExternalKv(s) => s.update(id, mutate).await,
        }
    }

    async fn delete(&self, id: Uuid) {
        match self {
            AnyStateManager::InMemory(s) => s.delete(id).await,
            AnyStateManager::ExternalKv(s) => s.delete(id).await,
        }
    }

    async fn emit(&self, event: Event) {
        match self {
            AnyStateManager::InMemory(s) => s.emit(event).await,
            AnyStateManager::ExternalKv(s) => s.emit(event).await,
        }
    }

    async fn subscribe(&self, id: Uuid) -> (SubscriptionId, mpsc::UnboundedReceiver<Event>) {
        match self {
            AnyStateManager::InMemory(s) => s.subscribe(id).await,
            AnyStateManager::ExternalKv(s) => s.subscribe(id).await,
        }
    }

    async fn unsubscribe(&self, id: Uuid, subscription: SubscriptionId) {
        match self {
            AnyStateManager::InMemory(s) => s.unsubscribe(id, subscription).await,
            AnyStateManager::ExternalKv(s) => s.unsubscribe(id, subscription).await,
        }
    }

    async fn list(&self, filter: ListFilter) -> Vec<WorkflowStatus> {
        match self {
            AnyStateManager::InMemory(s) => s.list(filter).await,
            AnyStateManager::ExternalKv(s) => s.list(filter).await,
        }
    }

    async fn cleanup(&self) {
        match self {
            AnyStateManager::InMemory(s) => s.cleanup().await,
            AnyStateManager::ExternalKv(s) => s.cleanup().await,
        }
    }
}

/// Shared application state, cheap to clone (every field is an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<Registry>,
    pub executor: Arc<WorkflowExecutor<AnyStateManager>>,
    pub workflows: Arc<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl AppState {
    pub fn new(
        config: Arc<GatewayConfig>,
        registry: Arc<Registry>,
        executor: Arc<WorkflowExecutor<AnyStateManager>>,
        workflows: HashMap<String, Arc<WorkflowDefinition>>,
    ) -> Self {
        Self {
            config,
            registry,
            executor,
            workflows: Arc::new(workflows),
        }
    }
}

