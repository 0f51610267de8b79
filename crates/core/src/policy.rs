//! Priority admission policy.
//!
//! [`resolve`] is the single place where a priority class turns into a queue
//! action. It is a pure function of the submission's priority and a snapshot
//! of dispatcher state, so the whole rule table can be exercised without a
//! queue, a renderer, or a running task.

use crate::job::Priority;

/// Snapshot of dispatcher state at the moment a submission is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueState {
    pub queue_is_empty: bool,
    pub dispatcher_is_busy: bool,
}

/// How a newly submitted job enters the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    /// Enqueue at the tail.
    Append,
    /// Enqueue at the head, ahead of all pending jobs.
    InsertFront,
    /// Enqueue at the tail only if the display is idle, otherwise shed.
    AppendIfIdle,
    /// Discard all pending jobs, cancel the in-flight one, and enqueue as
    /// the sole entry.
    FlushAndReplace,
}

/// Resolves a priority class to the queue action that admits the job.
///
/// An interrupt arriving while the display is quiet (nothing pending,
/// nothing in flight) has nothing to flush or cancel, so it degenerates to
/// a plain append.
pub fn resolve(priority: Priority, state: QueueState) -> QueueAction {
    match priority {
        Priority::Normal => QueueAction::Append,
        Priority::High => QueueAction::InsertFront,
        Priority::Low => QueueAction::AppendIfIdle,
        Priority::Interrupt => {
            if state.queue_is_empty && !state.dispatcher_is_busy {
                QueueAction::Append
            } else {
                QueueAction::FlushAndReplace
            }
        }
    }
}
