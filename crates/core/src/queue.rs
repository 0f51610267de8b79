//! Bounded pending-job queue.
//!
//! The queue is a plain data structure with no interior mutability or
//! locking. Exactly one owner (the dispatch loop) mutates it, which is what
//! makes the admission rules race-free. Operations that displace jobs hand
//! the displaced jobs back to the caller so a drop notification can be
//! published for every one of them.

use std::collections::VecDeque;

use crate::job::Job;

/// Default cap on pending jobs. Past this point the oldest pending entry is
/// evicted to make room, so a flood of submissions degrades by forgetting
/// stale work instead of growing without bound.
pub const DEFAULT_QUEUE_DEPTH: usize = 50;

/// FIFO buffer of jobs waiting for the display slot.
///
/// The head (front) is the next job to run. Priority classes enter through
/// different operations; see [`crate::policy`] for which class maps to which.
#[derive(Debug)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    max_depth: usize,
}

impl JobQueue {
    /// Creates a queue holding at most `max_depth` pending jobs.
    /// A zero depth is treated as one so the queue can always hold the job
    /// that triggered an admission.
    pub fn new(max_depth: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Appends at the tail. Returns the evicted oldest pending job when the
    /// queue was at capacity.
    pub fn append(&mut self, job: Job) -> Option<Job> {
        let evicted = self.evict_if_full();
        self.jobs.push_back(job);
        evicted
    }

    /// Inserts at the head, ahead of all pending jobs. Returns the evicted
    /// oldest pending job when the queue was at capacity.
    pub fn insert_front(&mut self, job: Job) -> Option<Job> {
        let evicted = self.evict_if_full();
        self.jobs.push_front(job);
        evicted
    }

    /// Appends only when the display is idle. When `dispatcher_is_busy` the
    /// job is handed back untouched via `Err` so the caller can report it as
    /// shed.
    pub fn append_if_idle(
        &mut self,
        job: Job,
        dispatcher_is_busy: bool,
    ) -> Result<Option<Job>, Job> {
        if dispatcher_is_busy {
            Err(job)
        } else {
            Ok(self.append(job))
        }
    }

    /// Discards every pending job and enqueues `job` as the sole entry.
    /// Returns the discarded jobs in their former queue order.
    pub fn flush_and_replace(&mut self, job: Job) -> Vec<Job> {
        let dropped = self.clear();
        self.jobs.push_back(job);
        dropped
    }

    /// Removes and returns the head, if any.
    pub fn pop_front(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Discards every pending job, returning them in queue order.
    pub fn clear(&mut self) -> Vec<Job> {
        self.jobs.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.jobs.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn evict_if_full(&mut self) -> Option<Job> {
        if self.jobs.len() < self.max_depth {
            return None;
        }
        // The head is the next job to run, not necessarily the oldest: a
        // front insertion reorders. Evict by submission time instead.
        let oldest = self
            .jobs
            .iter()
            .enumerate()
            .min_by_key(|(_, job)| job.submitted_at())
            .map(|(index, _)| index)?;
        self.jobs.remove(oldest)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}
