//! External key-value backed [`StateManager`] (SPEC_FULL.md §4.4, "External
//! key-value backend").
//!
//! Targets an Upstash-Redis-shaped REST API: `GET {base}/get/{key}`,
//! `POST {base}/set/{key}` (body is the raw value), `POST {base}/del/{key}`,
//! each responding `{"result": ...}` and authenticated with a bearer token.
//! This lets the gateway run multiple stateless replicas behind the same
//! external store without any gateway-specific server on the other end.
//!
//! The protocol has no scan/list primitive, so `list`/`cleanup` are scoped
//! to workflow ids this process instance has itself created or observed,
//! tracked in a local `DashMap` index. Event delivery is likewise local:
//! SPEC_FULL.md §4.4 only requires "guaranteed delivery to subscribers on
//! the instance handling the request," not cross-replica fan-out, so
//! `emit`/`subscribe` go through the same in-process [`EventBus`] the
//! in-memory backend uses. The KV store backs persistence and survives
//! restarts; it does not back pub/sub.

use std::sync::Arc;
use std::time::Duration;

use aigateway_types::event::Event;
use aigateway_types::workflow::WorkflowStatus;
use chrono::Utc;
use dashmap::DashMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use aigateway_core::event::{EventBus, SubscriptionId};
use aigateway_core::state::{ListFilter, StateError, StateManager};

#[derive(Debug, Deserialize)]
struct KvResponse {
    result: Option<String>,
}

/// `StateManager` backed by an Upstash-REST-shaped external KV store.
pub struct ExternalKvStateManager {
    client: Client,
    base_url: String,
    token: SecretString,
    bus: Arc<EventBus>,
    /// Ids this process has created or observed, since the KV wire
    /// protocol has no key-scan primitive.
    known_ids: Arc<DashMap<Uuid, ()>>,
    ttl: Duration,
}

impl ExternalKvStateManager {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, result_ttl_seconds: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: SecretString::from(token.into()),
            bus: Arc::new(EventBus::new()),
            known_ids: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(result_ttl_seconds),
        }
    }

    fn key(id: Uuid) -> String {
        format!("workflow:{id}")
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>, StateError> {
        let url = format!("{}/get/{key}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        let body: KvResponse = response
            .json()
            .await
            .map_err(|e| StateError::Backend(format!("malformed KV response: {e}")))?;
        Ok(body.result)
    }

    async fn kv_set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let url = format!("{}/set/{key}", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .header("Content-Type", "text/plain")
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn kv_del(&self, key: &str) -> Result<(), StateError> {
        let url = format!("{}/del/{key}", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Option<WorkflowStatus> {
        let raw = self.kv_get(&Self::key(id)).await.ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }
}

impl StateManager for ExternalKvStateManager {
    async fn create(&self, status: WorkflowStatus) -> Result<(), StateError> {
        let key = Self::key(status.id);
        if self.kv_get(&key).await?.is_some() {
            return Err(StateError::AlreadyExists(status.id));
        }
        let raw = serde_json::to_string(&status)
            .map_err(|e| StateError::Backend(format!("encoding workflow status: {e}")))?;
        self.kv_set(&key, &raw).await?;
        self.known_ids.insert(status.id, ());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<WorkflowStatus> {
        self.load(id).await
    }

    async fn update(&self, id: Uuid, mutate: Box<dyn FnOnce(&mut WorkflowStatus) + Send>) {
        let Some(mut status) = self.load(id).await else {
            return;
        };
        mutate(&mut status);
        status.updated_at = Utc::now();
        if let Ok(raw) = serde_json::to_string(&status) {
            let _ = self.kv_set(&Self::key(id), &raw).await;
        }
    }

    async fn delete(&self, id: Uuid) {
        let _ = self.kv_del(&Self::key(id)).await;
        self.known_ids.remove(&id);
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
        let ids: Vec<Uuid> = self.known_ids.iter().map(|entry| *entry.key()).collect();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(status) = self.load(id).await {
                if filter.status.is_none_or(|s| status.status == s) {
                    records.push(status);
                }
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        records
    }

    async fn cleanup(&self) {
        let now = Utc::now();
        let ids: Vec<Uuid> = self.known_ids.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let Some(status) = self.load(id).await else {
                self.known_ids.remove(&id);
                continue;
            };
            let expired = status.status.is_terminal()
                && now
                    .signed_duration_since(status.updated_at)
                    .to_std()
                    .map(|age| age > self.ttl)
                    .unwrap_or(false);
            if expired {
                let _ = self.kv_del(&Self::key(id)).await;
                self.known_ids.remove(&id);
                self.bus.clear(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_by_workflow_id() {
        let id = Uuid::now_v7();
        assert_eq!(ExternalKvStateManager::key(id), format!("workflow:{id}"));
    }

    #[tokio::test]
    async fn list_is_empty_before_anything_is_created() {
        let manager = ExternalKvStateManager::new("http://127.0.0.1:1", "token", 3600);
        let records = manager.list(ListFilter::default()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn emit_and_subscribe_go_through_the_local_bus_without_touching_the_network() {
        let manager = ExternalKvStateManager::new("http://127.0.0.1:1", "token", 3600);
        let id = Uuid::now_v7();
        let (_sub, mut rx) = manager.subscribe(id).await;
        manager
            .emit(Event::WorkflowComplete {
                workflow_id: id,
                timestamp: Utc::now(),
                result: serde_json::Value::Null,
                duration_ms: 1,
            })
            .await;
        assert!(rx.try_recv().is_ok());
    }
}
