//! Event subscription management.
//!
//! Tracks which node events have local subscribers so the client knows when
//! to send `subscribe`/`unsubscribe` to the node, and which events to
//! re-subscribe after the WebSocket connection is re-established.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use dagview_rpc::transport::{EventReceiver, NodeEvent, SubscriptionHandle};

/// Manages local event subscribers and supports re-subscription.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<NodeEvent, Vec<(u64, mpsc::UnboundedSender<Value>)>>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new local subscriber for `event`.
    pub fn register(&self, event: NodeEvent) -> (SubscriptionHandle, EventReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries
            .lock()
            .unwrap()
            .entry(event)
            .or_default()
            .push((id, tx));
        (SubscriptionHandle { event, id }, rx)
    }

    /// Returns `true` if `event` already has at least one local subscriber.
    pub fn has_subscribers(&self, event: NodeEvent) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&event)
            .is_some_and(|subs| !subs.is_empty())
    }

    /// Forward an incoming notification to every subscriber of `event`.
    /// Closed receivers are pruned.
    pub fn dispatch(&self, event: NodeEvent, message: Value) {
        if let Some(subs) = self.entries.lock().unwrap().get_mut(&event) {
            subs.retain(|(_, tx)| tx.send(message.clone()).is_ok());
        }
    }

    /// Remove a subscriber. Returns `true` if `event` has no subscribers left,
    /// meaning the node-side subscription can be dropped.
    pub fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(subs) = entries.get_mut(&handle.event) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(id, _)| *id != handle.id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            entries.remove(&handle.event);
        }
        removed && !entries.contains_key(&handle.event)
    }

    /// Events with at least one subscriber. Used to re-subscribe after reconnect.
    pub fn active_events(&self) -> Vec<NodeEvent> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(event, _)| *event)
            .collect()
    }

    /// Number of local subscribers across all events.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Returns `true` if there are no local subscribers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
