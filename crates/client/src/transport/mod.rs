//! Transport implementations
//!
//! The session runs over anything implementing
//! [`Transport`](veles_protocol::Transport): a WebSocket connection in
//! production, or an in-memory channel pair for tests.

pub mod memory;
pub mod websocket;

pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;
