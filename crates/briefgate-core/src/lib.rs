//! Content visibility and notification eligibility for the briefgate
//! marketplace.
//!
//! This crate is deliberately free of HTTP and database dependencies. It reads
//! entities through the [`store::MarketStore`] collaborator and hands
//! notification records to a [`notify::NotificationSink`]; everything else is
//! decision logic over plain data.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audience;
pub mod error;
pub mod listing;
pub mod membership;
pub mod memory;
pub mod model;
pub mod nda;
pub mod notify;
pub mod query;
pub mod store;
pub mod visibility;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
