//! dagview-ws — WebSocket node transport with auto-reconnect.
//!
//! # Features
//! - Auto-reconnect on disconnect (exponential backoff)
//! - Event subscriptions (`subscribe` / `unsubscribe` with `notify`)
//! - Auto-resubscribe after reconnect
//! - Request multiplexing over a single connection
//! - In-flight requests fail fast when the connection drops

pub mod client;
pub mod subscriptions;

pub use client::{WsClientConfig, WsNodeClient};
pub use subscriptions::SubscriptionManager;
