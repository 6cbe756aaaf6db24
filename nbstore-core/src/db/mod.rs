//! Database layer for nbstore
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations and idempotent counter seeding
//! - The counter store with per-row atomic updates

pub mod schema;
pub mod store;

pub use store::{CounterStore, UnseenDefaults};
