//! clipsync API library
//!
//! Account and message HTTP API plus the realtime side: a presence registry
//! of live device connections per account and a fanout engine pushing message
//! changes to every one of them.

pub mod auth;
pub mod config;
pub mod error;
pub mod fanout;
pub mod presence;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
