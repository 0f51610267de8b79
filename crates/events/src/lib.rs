//! Display event bus.
//!
//! Building blocks for observing the dispatch lifecycle:
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DisplayEvent`] -- the timestamped event envelope.
//! - [`EventKind`] -- the closed union of things the dispatcher reports.
//!
//! The dispatch loop publishes, everything else subscribes. Subscribers that
//! fall behind observe `RecvError::Lagged` and carry on; nothing in the
//! render path ever blocks on a slow consumer.

pub mod bus;

pub use bus::{DisplayEvent, DropReason, EventBus, EventKind};
