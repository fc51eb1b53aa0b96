//! The `NodeTransport` trait: request/response calls plus named event
//! subscriptions over a single node connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connecting or reconnecting.
    Connecting,
    /// Connection is open; calls and subscriptions are serviced.
    Open,
    /// Transport was shut down and will not reconnect.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Push events a node can notify about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEvent {
    /// A block was added to the DAG (not yet ordered).
    NewBlock,
    /// A block received its topoheight and block type.
    BlockOrdered,
}

impl NodeEvent {
    /// Event name as used on the wire (`notify` params and the `event`
    /// field of notifications).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewBlock => "new_block",
            Self::BlockOrdered => "block_ordered",
        }
    }

    /// Parse a wire event name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NewBlock" | "new_block" => Some(Self::NewBlock),
            "BlockOrdered" | "block_ordered" => Some(Self::BlockOrdered),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewBlock => f.write_str("NewBlock"),
            Self::BlockOrdered => f.write_str("BlockOrdered"),
        }
    }
}

/// Handle returned by [`NodeTransport::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    /// The subscribed event type.
    pub event: NodeEvent,
    /// Transport-local id, unique per subscription.
    pub id: u64,
}

/// Receiving end of a subscription. Payloads arrive in server-send order.
pub type EventReceiver = mpsc::UnboundedReceiver<Value>;

/// The central async trait every node connection must implement.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn NodeTransport>`.
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    /// Call a method and return its raw JSON result.
    ///
    /// In-flight calls fail with a [`TransportError`] when the connection drops.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Subscribe to a named event.
    ///
    /// Each distinct server-emitted event is delivered at most once per
    /// subscription, in the order the server sent it.
    async fn subscribe(
        &self,
        event: NodeEvent,
    ) -> Result<(SubscriptionHandle, EventReceiver), TransportError>;

    /// Drop a subscription. Unknown handles are ignored.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Returns `true` if the connection is open.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}
