//! Fanout of message events to every live connection of an account
//!
//! - **Event**: the created/deleted notification routed to connections
//! - **Transport**: the per-connection delivery seam
//! - **Dispatcher**: snapshot the presence set, deliver to each handle independently
//! - **Queue**: sharded workers that keep per-account publish order

pub mod dispatcher;
pub mod event;
pub mod queue;
pub mod transport;

pub use dispatcher::{FanoutDispatcher, FanoutReport};
pub use event::MessageEvent;
pub use queue::FanoutQueue;
pub use transport::{ConnectionTransport, DeliveryError};
