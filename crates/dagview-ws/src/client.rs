//! WebSocket node client with auto-reconnect and event re-subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use dagview_rpc::error::TransportError;
use dagview_rpc::request::{JsonRpcRequest, JsonRpcResponse};
use dagview_rpc::transport::{
    ConnectionState, EventReceiver, NodeEvent, NodeTransport, SubscriptionHandle,
};

use crate::subscriptions::SubscriptionManager;

type ResponseTx = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, ResponseTx>>>;

/// Request id used for subscriptions replayed after a reconnect. Caller ids
/// start at 1.
const RESUBSCRIBE_ID: u64 = 0;

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Reconnect backoff starting duration.
    pub reconnect_initial: Duration,
    /// Maximum reconnect backoff.
    pub reconnect_max: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send {
        req: JsonRpcRequest,
        tx: ResponseTx,
    },
    Close,
}

/// WebSocket node client.
///
/// Maintains a background task that owns the WebSocket connection and
/// handles reconnect + re-subscribe logic transparently. Requests that are
/// in flight when the connection drops fail with [`TransportError::WebSocket`].
pub struct WsNodeClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    state: Arc<Mutex<ConnectionState>>,
    req_id: AtomicU64,
}

impl WsNodeClient {
    /// Start the background task for `url`.
    ///
    /// Returns immediately; the connection is opened in the background and
    /// [`NodeTransport::is_connected`] turns `true` once it is up.
    pub fn connect(url: impl Into<String>, config: WsClientConfig) -> Self {
        let url = url.into();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));

        let task = WsTask {
            url: url.clone(),
            subscriptions: subscriptions.clone(),
            state: state.clone(),
            config,
        };
        tokio::spawn(async move {
            task.run(cmd_rx).await;
        });

        Self {
            url,
            cmd_tx,
            subscriptions,
            state,
            req_id: AtomicU64::new(1),
        }
    }

    /// Wait until the connection is open or `timeout` elapses.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = time::Instant::now() + timeout;
        while time::Instant::now() < deadline {
            match self.state() {
                ConnectionState::Open => return true,
                ConnectionState::Closed => return false,
                ConnectionState::Connecting => time::sleep(Duration::from_millis(50)).await,
            }
        }
        self.is_connected()
    }

    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::Closed)?;
        rx.await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    fn next_id(&self) -> u64 {
        self.req_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Drop for WsNodeClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl NodeTransport for WsNodeClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(self.next_id(), method, params);
        let resp = self.send(req).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }

    async fn subscribe(
        &self,
        event: NodeEvent,
    ) -> Result<(SubscriptionHandle, EventReceiver), TransportError> {
        if !self.subscriptions.has_subscribers(event) {
            self.call("subscribe", json!({ "notify": event.as_str() })).await?;
            tracing::debug!(event = %event, "subscribed on node");
        }
        Ok(self.subscriptions.register(event))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        if self.subscriptions.remove(&handle) && self.is_connected() {
            self.call("unsubscribe", json!({ "notify": handle.event.as_str() }))
                .await?;
            tracing::debug!(event = %handle.event, "unsubscribed on node");
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Background task that owns the WebSocket connection.
struct WsTask {
    url: String,
    subscriptions: SubscriptionManager,
    state: Arc<Mutex<ConnectionState>>,
    config: WsClientConfig,
}

impl WsTask {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>) {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let mut backoff = self.config.reconnect_initial;

        loop {
            self.set_state(ConnectionState::Connecting);
            tracing::info!(url = %self.url, "connecting via WebSocket");

            let (ws_stream, _) = match tokio_tungstenite::connect_async(&self.url).await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "WS connect failed, retrying in {backoff:?}");
                    if self.sleep_or_close(&mut cmd_rx, backoff).await {
                        break;
                    }
                    backoff = (backoff * 2).min(self.config.reconnect_max);
                    continue;
                }
            };

            backoff = self.config.reconnect_initial;
            let (mut sink, mut stream) = ws_stream.split();

            // Re-subscribe events that have local subscribers
            for event in self.subscriptions.active_events() {
                let req = JsonRpcRequest::new(
                    RESUBSCRIBE_ID,
                    "subscribe",
                    json!({ "notify": event.as_str() }),
                );
                let sent = match serde_json::to_string(&req) {
                    Ok(msg) => sink
                        .send(Message::Text(msg.into()))
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                if let Err(e) = sent {
                    tracing::warn!(error = %e, %event, "re-subscribe after reconnect failed");
                }
            }

            self.set_state(ConnectionState::Open);
            tracing::info!(url = %self.url, "WS connected");

            let closed = loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            None | Some(WsCommand::Close) => break true,
                            Some(WsCommand::Send { req, tx }) => {
                                let Some(id) = req.id.as_number() else {
                                    let _ = tx.send(Err(TransportError::Other("non-numeric request id".into())));
                                    continue;
                                };
                                let msg = match serde_json::to_string(&req) {
                                    Ok(msg) => msg,
                                    Err(e) => {
                                        let _ = tx.send(Err(TransportError::Deserialization(e)));
                                        continue;
                                    }
                                };
                                track_pending(&pending, id, tx);
                                if sink.send(Message::Text(msg.into())).await.is_err() {
                                    break false;
                                }
                            }
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            None => break false,
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "WS receive error");
                                break false;
                            }
                            Some(Ok(Message::Text(text))) => {
                                handle_message(&text, &pending, &self.subscriptions);
                            }
                            Some(Ok(Message::Close(_))) => break false,
                            _ => {}
                        }
                    }
                }
            };

            fail_pending(&pending, "connection lost");

            if closed {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            tracing::warn!(url = %self.url, "WS disconnected, reconnecting in {backoff:?}");
            if self.sleep_or_close(&mut cmd_rx, backoff).await {
                break;
            }
            backoff = (backoff * 2).min(self.config.reconnect_max);
        }

        fail_pending(&pending, "client closed");
        self.set_state(ConnectionState::Closed);
        tracing::info!(url = %self.url, "WS client closed");
    }

    /// Sleep for `backoff`, failing any requests sent meanwhile.
    /// Returns `true` if the client was closed during the wait.
    async fn sleep_or_close(
        &self,
        cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>,
        backoff: Duration,
    ) -> bool {
        let sleep = time::sleep(backoff);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(WsCommand::Close) => return true,
                    Some(WsCommand::Send { tx, .. }) => {
                        let _ = tx.send(Err(TransportError::NotConnected));
                    }
                },
            }
        }
    }
}

/// Register a call awaiting its response. Entries whose caller stopped
/// waiting (timed out or cancelled) are dropped on the way.
fn track_pending(pending: &PendingMap, id: u64, tx: ResponseTx) {
    let mut pending = pending.lock().unwrap();
    pending.retain(|_, waiting| !waiting.is_closed());
    pending.insert(id, tx);
}

fn fail_pending(pending: &PendingMap, reason: &str) {
    for (_, tx) in pending.lock().unwrap().drain() {
        let _ = tx.send(Err(TransportError::WebSocket(reason.to_string())));
    }
}

/// Route one inbound text frame: a response to a pending call, or an event
/// notification carrying an `event` name in its result.
fn handle_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionManager) {
    let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(text) else {
        tracing::debug!("failed to parse WS message as JSON-RPC");
        return;
    };

    if let Some(id) = resp.id.as_number() {
        if let Some(tx) = pending.lock().unwrap().remove(&id) {
            let _ = tx.send(Ok(resp));
            return;
        }
    }

    if let Some(err) = &resp.error {
        if resp.id.as_number() == Some(RESUBSCRIBE_ID) {
            tracing::warn!(code = err.code, message = %err.message, "node rejected re-subscribe");
        } else {
            tracing::debug!(id = %resp.id, code = err.code, "error reply for unknown request");
        }
        return;
    }

    let Some(result) = resp.result else {
        return;
    };
    let event = result
        .get("event")
        .and_then(Value::as_str)
        .and_then(NodeEvent::from_name);
    match event {
        Some(event) => subscriptions.dispatch(event, result),
        None => tracing::debug!(id = %resp.id, "unmatched WS message"),
    }
}
