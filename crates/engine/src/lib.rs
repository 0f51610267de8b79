//! The dispatch engine.
//!
//! One long-lived task owns the job queue and the single display slot;
//! every submission, control command, and render settlement arrives as a
//! message on that task's mailbox. Serialising all state transitions
//! through one consumer is what removes the start/finish races a shared
//! busy flag would invite.
//!
//! - [`Dispatcher`] -- cheap cloneable handle used by the server layer.
//! - [`DispatcherConfig`] -- queue depth and stop timeout knobs.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, DispatcherClosed, DispatcherConfig, DispatcherStatus};
