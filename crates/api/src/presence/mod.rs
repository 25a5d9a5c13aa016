//! Presence tracking for live connections
//!
//! Maps an account to the set of connection handles that are currently open
//! for it, across every device the account has connected.
//!
//! # Architecture
//!
//! - **Registry**: the shared set store (`ConnectionRegistry`), backed by Redis
//!   or by process memory
//! - **Manager**: the register/deregister/lookup protocol on top of a registry

pub mod manager;
pub mod memory;
pub mod redis;
pub mod registry;

pub use manager::{PresenceError, PresenceManager};
pub use memory::MemoryRegistry;
pub use redis::RedisRegistry;
pub use registry::{ConnectionHandle, ConnectionRegistry, RegistryError, RegistryResult, Removal};
