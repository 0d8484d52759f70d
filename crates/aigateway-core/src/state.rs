//! Workflow state storage (SPEC_FULL.md §4.4, "State manager").
//!
//! Replaces the reference codebase's `WorkflowRepository` (a SQLite-shaped
//! CRUD trait over `WorkflowDefinition`/`WorkflowRun`/`WorkflowStepLog`)
//! with a narrower contract matching the gateway's actual persisted unit:
//! one `WorkflowStatus` record per run, keyed by id, with attached
//! pub/sub. `InMemoryStateManager` is grounded on the same "mutable keyed
//! store behind a concurrent map" shape the reference codebase's registry
//! and event bus both use; an external key-value-backed implementation
//! (SPEC_FULL.md §4.4, "External key-value backend") lives in the infra
//! crate since it needs an HTTP client.

use std::sync::Arc;
use std::time::Duration;

use aigateway_types::event::Event;
use aigateway_types::workflow::{WorkflowState, WorkflowStatus};
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::event::{EventBus, SubscriptionId};

/// Optional filters for [`StateManager::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<WorkflowState>,
    pub limit: Option<usize>,
}

/// Persistence and pub/sub contract for workflow runs. Both the in-memory
/// and external key-value backends implement this; the workflow executor
/// and the HTTP layer only ever see `Arc<dyn StateManager>`.
pub trait StateManager: Send + Sync {
    /// Persist a new record. Fails if `status.id` already exists.
    fn create(&self, status: WorkflowStatus) -> impl std::future::Future<Output = Result<(), StateError>> + Send;

    fn get(&self, id: Uuid) -> impl std::future::Future<Output = Option<WorkflowStatus>> + Send;

    /// Apply `mutate` to the stored record and bump `updated_at`. A no-op
    /// if `id` is missing.
    fn update(
        &self,
        id: Uuid,
        mutate: Box<dyn FnOnce(&mut WorkflowStatus) + Send>,
    ) -> impl std::future::Future<Output = ()> + Send;

    /// Remove the record and drop its subscribers.
    fn delete(&self, id: Uuid) -> impl std::future::Future<Output = ()> + Send;

    /// Deliver `event` to every subscriber of `event.workflow_id()`.
    /// Best-effort: one subscriber's failure never blocks the others.
    fn emit(&self, event: Event) -> impl std::future::Future<Output = ()> + Send;

    fn subscribe(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = (SubscriptionId, tokio::sync::mpsc::UnboundedReceiver<Event>)> + Send;

    fn unsubscribe(&self, id: Uuid, subscription: SubscriptionId) -> impl std::future::Future<Output = ()> + Send;

    /// Snapshot of records matching `filter`, sorted by `created_at`
    /// descending, truncated to `filter.limit`.
    fn list(&self, filter: ListFilter) -> impl std::future::Future<Output = Vec<WorkflowStatus>> + Send;

    /// Remove terminal records whose `updated_at` is older than the TTL.
    fn cleanup(&self) -> impl std::future::Future<Output = ()> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("workflow '{0}' already exists")]
    AlreadyExists(Uuid),
    #[error("state backend error: {0}")]
    Backend(String),
}

/// In-process `StateManager`: a `DashMap` keyed store plus the shared
/// [`EventBus`] for subscriptions. A background task sweeps expired
/// terminal records every 60 seconds (SPEC_FULL.md §4.4).
pub struct InMemoryStateManager {
    store: Arc<DashMap<Uuid, WorkflowStatus>>,
    bus: Arc<EventBus>,
    ttl: Duration,
}

impl InMemoryStateManager {
    pub fn new(result_ttl_seconds: u64) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            bus: Arc::new(EventBus::new()),
            ttl: Duration::from_secs(result_ttl_seconds),
        }
    }

    /// Spawn the periodic cleanup sweep described in SPEC_FULL.md §4.4.
    /// Call once at startup; the returned handle may be dropped (the
    /// sweep is best-effort, not load-bearing for correctness).
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                manager.cleanup().await;
            }
        })
    }
}

impl StateManager for InMemoryStateManager {
    async fn create(&self, status: WorkflowStatus) -> Result<(), StateError> {
        if self.store.contains_key(&status.id) {
            return Err(StateError::AlreadyExists(status.id));
        }
        self.store.insert(status.id, status);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<WorkflowStatus> {
        self.store.get(&id).map(|entry| entry.clone())
    }

    async fn update(&self, id: Uuid, mutate: Box<dyn FnOnce(&mut WorkflowStatus) + Send>) {
        if let Some(mut entry) = self.store.get_mut(&id) {
            mutate(&mut entry);
            entry.updated_at = Utc::now();
        }
    }

    async fn delete(&self, id: Uuid) {
        self.store.remove(&id);
        self.bus.clear(id);
    }

    async fn emit(&self, event: Event) {
        self.bus.emit(event);
    }

    async fn subscribe(&self, id: Uuid) -> (SubscriptionId, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        self.bus.subscribe(id)
    }

    async fn unsubscribe(&self, id: Uuid, subscription: SubscriptionId) {
        self.bus.unsubscribe(id, subscription);
    }

    async fn list(&self, filter: ListFilter) -> Vec<WorkflowStatus> {
        let mut records: Vec<WorkflowStatus> = self
            .store
            .iter()
            .filter(|entry| filter.status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        records
    }

    async fn cleanup(&self) {
        let now = Utc::now();
        let ttl = self.ttl;
        let expired: Vec<Uuid> = self
            .store
            .iter()
            .filter(|entry| {
                entry.status.is_terminal()
                    && now.signed_duration_since(entry.updated_at).to_std().map(|age| age > ttl).unwrap_or(false)
            })
            .map(|entry| *entry.key())
            .collect();
        for id in expired {
            self.store.remove(&id);
            self.bus.clear(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigateway_types::workflow::StepStatus;
    use serde_json::Value;

    fn sample_status(id: Uuid) -> WorkflowStatus {
        WorkflowStatus::new(id, "demo", Value::Null, vec![StepStatus::pending(0, "a", "text")])
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let manager = InMemoryStateManager::new(3600);
        let id = Uuid::now_v7();
        manager.create(sample_status(id)).await.unwrap();
        let fetched = manager.get(id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let manager = InMemoryStateManager::new(3600);
        let id = Uuid::now_v7();
        manager.create(sample_status(id)).await.unwrap();
        let err = manager.create(sample_status(id)).await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists(dup) if dup == id));
    }

    #[tokio::test]
    async fn update_merges_and_bumps_updated_at() {
        let manager = InMemoryStateManager::new(3600);
        let id = Uuid::now_v7();
        manager.create(sample_status(id)).await.unwrap();
        let before = manager.get(id).await.unwrap().updated_at;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager
            .update(id, Box::new(|status| status.status = WorkflowState::Running))
            .await;
        let after = manager.get(id).await.unwrap();
        assert_eq!(after.status, WorkflowState::Running);
        assert!(after.updated_at >= before);
    }

    #[tokio::test]
    async fn update_on_missing_id_is_a_noop() {
        let manager = InMemoryStateManager::new(3600);
        manager.update(Uuid::now_v7(), Box::new(|_| {})).await;
    }

    #[tokio::test]
    async fn delete_removes_record_and_subscribers() {
        let manager = InMemoryStateManager::new(3600);
        let id = Uuid::now_v7();
        manager.create(sample_status(id)).await.unwrap();
        let (_sub, mut rx) = manager.subscribe(id).await;
        manager.delete(id).await;
        assert!(manager.get(id).await.is_none());
        manager
            .emit(Event::WorkflowComplete {
                workflow_id: id,
                timestamp: Utc::now(),
                result: Value::Null,
                duration_ms: 1,
            })
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn list_filters_by_status_sorts_newest_first_and_truncates() {
        let manager = InMemoryStateManager::new(3600);
        let a = Uuid::now_v7();
        manager.create(sample_status(a)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let b = Uuid::now_v7();
        manager.create(sample_status(b)).await.unwrap();
        manager
            .update(b, Box::new(|status| status.status = WorkflowState::Running))
            .await;

        let running = manager
            .list(ListFilter {
                status: Some(WorkflowState::Running),
                limit: None,
            })
            .await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, b);

        let all = manager.list(ListFilter::default()).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);

        let limited = manager.list(ListFilter { status: None, limit: Some(1) }).await;
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_removes_expired_terminal_records_only() {
        let manager = InMemoryStateManager::new(0);
        let terminal = Uuid::now_v7();
        manager.create(sample_status(terminal)).await.unwrap();
        manager
            .update(terminal, Box::new(|status| status.status = WorkflowState::Completed))
            .await;

        let pending = Uuid::now_v7();
        manager.create(sample_status(pending)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.cleanup().await;

        assert!(manager.get(terminal).await.is_none());
        assert!(manager.get(pending).await.is_some());
    }
}
