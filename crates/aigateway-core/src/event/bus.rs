//! Per-workflow event fan-out (SPEC_FULL.md §4.4, §5).
//!
//! Replaces the reference codebase's single global `tokio::sync::broadcast`
//! channel with a `DashMap` keyed by workflow id, each entry holding a list
//! of subscriber senders. A global channel would deliver every workflow's
//! events to every subscriber; the spec requires per-id ordering and an
//! unsubscribe that is scoped to one workflow and safe to call twice.
//! Delivery happens outside any writer lock: callers copy the subscriber
//! list out from under the `DashMap` shard guard, then send -- the same
//! discipline the registry uses for provider invocation.

use std::sync::atomic::{AtomicU64, Ordering};

use aigateway_types::event::Event;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle returned by [`EventBus::subscribe`]; pass back to
/// [`EventBus::unsubscribe`] to stop delivery. Unsubscribing twice, or
/// with a stale id after the workflow's entry was dropped, is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Event>,
}

/// Multi-consumer event bus, one subscriber list per workflow id.
pub struct EventBus {
    subscribers: DashMap<Uuid, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a subscriber for `workflow_id`, returning the receiving
    /// half of an unbounded channel plus a handle for [`Self::unsubscribe`].
    pub fn subscribe(&self, workflow_id: Uuid) -> (SubscriptionId, mpsc::UnboundedReceiver<Event>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(workflow_id).or_default().push(Subscriber { id, sender: tx });
        (id, rx)
    }

    /// Idempotent: removing an id that's already gone (or a workflow with
    /// no subscribers) is a no-op.
    pub fn unsubscribe(&self, workflow_id: Uuid, id: SubscriptionId) {
        if let Some(mut entry) = self.subscribers.get_mut(&workflow_id) {
            entry.retain(|s| s.id != id);
        }
    }

    /// Deliver `event` to every subscriber of its workflow id. A full or
    /// closed channel is logged and skipped -- one slow or dead subscriber
    /// never blocks or drops delivery to the others.
    pub fn emit(&self, event: Event) {
        let workflow_id = event.workflow_id();
        let senders: Vec<mpsc::UnboundedSender<Event>> = match self.subscribers.get(&workflow_id) {
            Some(entry) => entry.iter().map(|s| s.sender.clone()).collect(),
            None => return,
        };
        for sender in senders {
            if sender.send(event.clone()).is_err() {
                tracing::debug!(%workflow_id, "dropping event for closed subscriber");
            }
        }
    }

    /// Drop every subscriber registered for `workflow_id` (called when a
    /// workflow's state record is deleted).
    pub fn clear(&self, workflow_id: Uuid) {
        self.subscribers.remove(&workflow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn queued_event(workflow_id: Uuid) -> Event {
        Event::WorkflowQueued {
            workflow_id,
            timestamp: Utc::now(),
            name: "demo".to_string(),
            position: 1,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_for_its_workflow_id() {
        let bus = EventBus::new();
        let workflow_id = Uuid::now_v7();
        let (_id, mut rx) = bus.subscribe(workflow_id);
        bus.emit(queued_event(workflow_id));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.workflow_id(), workflow_id);
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.emit(queued_event(Uuid::now_v7()));
    }

    #[tokio::test]
    async fn events_for_other_workflow_ids_are_not_delivered() {
        let bus = EventBus::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let (_id, mut rx) = bus.subscribe(a);
        bus.emit(queued_event(b));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_stops_delivery() {
        let bus = EventBus::new();
        let workflow_id = Uuid::now_v7();
        let (id, mut rx) = bus.subscribe(workflow_id);
        bus.unsubscribe(workflow_id, id);
        bus.unsubscribe(workflow_id, id);
        bus.emit(queued_event(workflow_id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive_in_emitted_order() {
        let bus = EventBus::new();
        let workflow_id = Uuid::now_v7();
        let (_id1, mut rx1) = bus.subscribe(workflow_id);
        let (_id2, mut rx2) = bus.subscribe(workflow_id);
        bus.emit(queued_event(workflow_id));
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
