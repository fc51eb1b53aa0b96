//! dagview-rpc — wire types and the node transport abstraction for DagView.
//!
//! # Architecture
//!
//! ```text
//! NodeTransport (trait)
//!     ├── call(method, params)        request/response
//!     ├── subscribe(NodeEvent)        ordered push events
//!     └── unsubscribe(handle)
//!
//! Implementations:
//!     ├── dagview-ws::WsNodeClient    WebSocket, auto-reconnect
//!     └── MemoryTransport             scripted, for tests and demos
//! ```

pub mod error;
pub mod memory;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use memory::MemoryTransport;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{
    ConnectionState, EventReceiver, NodeEvent, NodeTransport, SubscriptionHandle,
};
