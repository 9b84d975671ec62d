//! SQLite backend for the briefgate engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] is both the engine's
//! [`MarketStore`](briefgate_core::store::MarketStore) and, through an outbox
//! table, its [`NotificationSink`](briefgate_core::notify::NotificationSink).

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
