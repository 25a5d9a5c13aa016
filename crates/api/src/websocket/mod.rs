//! WebSocket support for realtime message delivery
//!
//! # Architecture
//!
//! - **Connection**: one accepted socket and its registration state machine
//! - **State**: outbound channels of every local connection; the fanout transport
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod state;

pub use connection::{Connection, ConnectionState};
pub use handler::ws_handler;
pub use state::WebSocketState;
