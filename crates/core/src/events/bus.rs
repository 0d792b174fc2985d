// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for routing orchestration events to subscribers
//!
//! Publishing never blocks and never fails. Subscribers whose receiver was
//! dropped are pruned on the next publish.

use super::subscription::{SubscriberId, Subscription};
use crate::event::OrchestrationEvent;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Sender for event delivery
pub type EventSender = mpsc::UnboundedSender<OrchestrationEvent>;
/// Receiver for event delivery
pub type EventReceiver = mpsc::UnboundedReceiver<OrchestrationEvent>;

/// The event bus routes events to matching subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, (Subscription, EventSender)>>>,
    /// Receives every event regardless of subscriptions
    audit: Arc<RwLock<Option<EventSender>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events matching the subscription's patterns
    ///
    /// Re-subscribing with an existing id replaces the previous channel.
    pub fn subscribe(&self, subscription: Subscription) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = subscription.id.clone();

        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id, (subscription, tx));

        rx
    }

    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(id);
    }

    /// Set the audit sink that receives all events
    pub fn set_audit_sink(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut audit = self.audit.write().unwrap_or_else(|e| e.into_inner());
        *audit = Some(tx);
        rx
    }

    /// Publish an event to all matching subscribers
    ///
    /// Returns how many subscribers the event was delivered to (the audit
    /// sink is not counted).
    pub fn publish(&self, event: OrchestrationEvent) -> usize {
        let event_name = event.name();

        if let Some(tx) = self.audit.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.send(event.clone());
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, (subscription, tx)) in subs.iter() {
                if !subscription.matches(event_name) {
                    continue;
                }
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in &closed {
                subs.remove(id);
            }
            tracing::debug!(pruned = closed.len(), "removed closed subscribers");
        }

        tracing::trace!(
            event = event_name,
            plan_execution_id = %event.plan_execution_id,
            status = %event.status,
            delivered,
            "published"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
