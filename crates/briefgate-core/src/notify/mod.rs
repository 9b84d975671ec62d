//! Notification eligibility: who hears about an event, on which channel, and
//! how the records reach the delivery collaborator.
//!
//! ```text
//! NotificationEvent ─▶ resolve_recipients ─▶ Vec<Delivery> ─▶ dispatch ─▶ NotificationSink
//!                                                               ▲
//!                  run_weekly_digest (per user) ────────────────┘
//! ```

pub mod digest;
pub mod dispatch;
pub mod event;
pub mod fanout;

pub use digest::{DigestReport, run_weekly_digest, weekly_digest_for};
pub use dispatch::{DispatchReport, NotificationSink, dispatch};
pub use event::{
  BriefChange, Channel, Delivery, DigestItem, EventKind, Notification,
  NotificationEvent,
};
pub use fanout::resolve_recipients;

/// Maximum number of deliveries in flight per dispatch.
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 10;
