//! Domain types and pure dispatch logic for the marquee display server.
//!
//! Everything in this crate is synchronous and side-effect free:
//!
//! - [`Job`], [`JobPayload`], [`Priority`] -- the submission vocabulary.
//! - [`JobQueue`] -- the bounded pending-job buffer and its priority-specific
//!   insert operations.
//! - [`policy`] -- the pure mapping from a job's priority to the queue action
//!   that admits it.
//!
//! The async dispatch loop lives in `marquee-engine`. Keeping this crate free
//! of runtime dependencies keeps every queueing rule unit-testable without
//! spawning tasks.

pub mod error;
pub mod job;
pub mod policy;
pub mod queue;

pub use error::UnknownPriority;
pub use job::{
    AnimationOptions, ClockOptions, EmojiOptions, Job, JobId, JobKind, JobPayload, PerlinOptions,
    Priority, RainOptions, TextOptions,
};
pub use policy::{QueueAction, QueueState};
pub use queue::{JobQueue, DEFAULT_QUEUE_DEPTH};
