//! clipsync shared types and utilities
//!
//! This crate contains the domain types and database helpers shared by the
//! clipsync services.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
