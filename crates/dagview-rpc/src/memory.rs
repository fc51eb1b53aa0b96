//! In-memory transport for tests and offline demos.
//!
//! Method responses are scripted per method name, events are injected with
//! [`MemoryTransport::emit`], and connectivity can be toggled to exercise
//! not-connected paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{
    ConnectionState, EventReceiver, NodeEvent, NodeTransport, SubscriptionHandle,
};

type Responder = Arc<dyn Fn(&Value) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Default)]
struct Inner {
    connected: bool,
    responders: HashMap<String, Responder>,
    calls: Vec<(String, Value)>,
    subscribers: HashMap<NodeEvent, Vec<(u64, mpsc::UnboundedSender<Value>)>>,
    next_id: u64,
    delay: Option<Duration>,
}

/// Scriptable in-memory [`NodeTransport`].
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    /// A connected transport with no scripted methods.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                connected: true,
                ..Default::default()
            }),
        }
    }

    /// Always answer `method` with `result`.
    pub fn respond(&self, method: &str, result: Value) {
        self.respond_with(method, move |_| Ok(result.clone()));
    }

    /// Answer `method` by running `f` on the call parameters.
    pub fn respond_with<F>(&self, method: &str, f: F)
    where
        F: Fn(&Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .responders
            .insert(method.to_string(), Arc::new(f));
    }

    /// Delay every call by `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.inner.lock().unwrap().delay = delay;
    }

    /// Toggle connectivity. While disconnected, calls and subscriptions fail
    /// with [`TransportError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().unwrap().connected = connected;
    }

    /// Deliver `payload` to every live subscriber of `event`.
    /// Returns the number of subscribers reached.
    pub fn emit(&self, event: NodeEvent, payload: Value) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let Some(subs) = inner.subscribers.get_mut(&event) else {
            return 0;
        };
        subs.retain(|(_, tx)| !tx.is_closed());
        let mut reached = 0;
        for (_, tx) in subs.iter() {
            if tx.send(payload.clone()).is_ok() {
                reached += 1;
            }
        }
        reached
    }

    /// Every `(method, params)` pair called so far, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of calls made to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Number of registered subscriptions for `event`.
    pub fn subscriber_count(&self, event: NodeEvent) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .get(&event)
            .map_or(0, Vec::len)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeTransport for MemoryTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let (responder, delay) = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.connected {
                return Err(TransportError::NotConnected);
            }
            inner.calls.push((method.to_string(), params.clone()));
            (inner.responders.get(method).cloned(), inner.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match responder {
            Some(f) => f(&params),
            None => Err(TransportError::Other(format!("no response scripted for {method}"))),
        }
    }

    async fn subscribe(
        &self,
        event: NodeEvent,
    ) -> Result<(SubscriptionHandle, EventReceiver), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.entry(event).or_default().push((id, tx));
        Ok((SubscriptionHandle { event, id }, rx))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        if let Some(subs) = self.inner.lock().unwrap().subscribers.get_mut(&handle.event) {
            subs.retain(|(id, _)| *id != handle.id);
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        if self.inner.lock().unwrap().connected {
            ConnectionState::Open
        } else {
            ConnectionState::Connecting
        }
    }

    fn url(&self) -> &str {
        "memory://"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_call_and_record() {
        let t = MemoryTransport::new();
        t.respond("get_topoheight", Value::from(42u64));
        let v = t.call("get_topoheight", Value::Null).await.unwrap();
        assert_eq!(v, Value::from(42u64));
        assert_eq!(t.call_count("get_topoheight"), 1);
        assert!(t.call("get_info", Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn disconnected_calls_fail() {
        let t = MemoryTransport::new();
        t.respond("get_topoheight", Value::from(1u64));
        t.set_connected(false);
        assert!(!t.is_connected());
        let err = t.call("get_topoheight", Value::Null).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        assert!(t.subscribe(NodeEvent::NewBlock).await.is_err());
    }

    #[tokio::test]
    async fn emit_reaches_subscribers_in_order() {
        let t = MemoryTransport::new();
        let (handle, mut rx) = t.subscribe(NodeEvent::NewBlock).await.unwrap();
        assert_eq!(t.emit(NodeEvent::NewBlock, serde_json::json!({"n": 1})), 1);
        assert_eq!(t.emit(NodeEvent::NewBlock, serde_json::json!({"n": 2})), 1);
        assert_eq!(t.emit(NodeEvent::BlockOrdered, serde_json::json!({})), 0);
        assert_eq!(rx.recv().await.unwrap()["n"], 1);
        assert_eq!(rx.recv().await.unwrap()["n"], 2);

        t.unsubscribe(handle).await.unwrap();
        assert_eq!(t.subscriber_count(NodeEvent::NewBlock), 0);
    }
}
