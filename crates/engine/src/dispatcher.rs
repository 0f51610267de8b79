//! Single-slot display dispatcher.
//!
//! A single long-lived Tokio task owns the [`JobQueue`] and the in-flight
//! slot. Submissions, control commands, and render settlements all arrive
//! on its mailbox, so there is no instant at which two actors can observe
//! or mutate dispatch state concurrently.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use marquee_core::{
    policy, Job, JobId, JobKind, JobPayload, JobQueue, Priority, QueueAction, QueueState,
    DEFAULT_QUEUE_DEPTH,
};
use marquee_events::{DisplayEvent, DropReason, EventBus};
use marquee_renderer::{RenderError, Renderer};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Default grace period for a renderer to acknowledge a stop request.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `shutdown` waits for the loop task to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning knobs for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Cap on pending jobs before the oldest is evicted.
    pub max_queue_depth: usize,
    /// Grace period for the renderer to acknowledge a stop request. On
    /// expiry the slot stays busy until the job settles on its own; an
    /// unacknowledged stop never forges a settlement.
    pub stop_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: DEFAULT_QUEUE_DEPTH,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Point-in-time dispatch state, for health reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStatus {
    pub busy: bool,
    pub queue_depth: usize,
}

/// Error when the dispatch loop is no longer running.
#[derive(Debug, thiserror::Error)]
#[error("dispatch loop is not running")]
pub struct DispatcherClosed;

/// Commands accepted by the dispatch loop.
enum Command {
    Submit(Job),
    /// Clear all pending jobs and cooperatively stop the in-flight one.
    StopAll,
    Status(oneshot::Sender<DispatcherStatus>),
}

/// Settlement of a spawned render task.
struct Settlement {
    id: JobId,
    kind: JobKind,
    result: Result<(), RenderError>,
}

/// Handle to the dispatch loop.
///
/// Created once at application startup via [`Dispatcher::start`]. The
/// returned `Arc` can be cheaply cloned into connection handlers.
pub struct Dispatcher {
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the dispatch loop and return a shared handle to it.
    pub fn start(
        renderer: Arc<dyn Renderer>,
        bus: Arc<EventBus>,
        config: DispatcherConfig,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let dispatch = DispatchLoop {
            queue: JobQueue::new(config.max_queue_depth),
            renderer,
            bus,
            cmd_rx,
            done_tx,
            done_rx,
            cancel: cancel.child_token(),
            stop_timeout: config.stop_timeout,
            in_flight: None,
        };
        let task = tokio::spawn(dispatch.run());

        Arc::new(Self {
            cmd_tx,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Submit a payload for display. Returns the id assigned to the job.
    ///
    /// Admission (append, queue-jump, shed, or flush) happens inside the
    /// loop task; this never blocks on the renderer.
    pub fn submit(
        &self,
        payload: JobPayload,
        priority: Priority,
    ) -> Result<JobId, DispatcherClosed> {
        let job = Job::new(payload, priority);
        let id = job.id();
        self.cmd_tx
            .send(Command::Submit(job))
            .map_err(|_| DispatcherClosed)?;
        Ok(id)
    }

    /// Clear all pending jobs and cooperatively stop the in-flight one.
    pub fn stop_all(&self) -> Result<(), DispatcherClosed> {
        self.cmd_tx
            .send(Command::StopAll)
            .map_err(|_| DispatcherClosed)
    }

    /// Current busy flag and queue depth.
    pub async fn status(&self) -> Result<DispatcherStatus, DispatcherClosed> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status(tx))
            .map_err(|_| DispatcherClosed)?;
        rx.await.map_err(|_| DispatcherClosed)
    }

    /// Stop the dispatch loop, winding down the in-flight job.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down dispatcher");
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await;
        }
    }
}

/// The job currently holding the display slot.
struct CurrentJob {
    id: JobId,
    kind: JobKind,
}

/// State owned exclusively by the dispatch loop task.
struct DispatchLoop {
    queue: JobQueue,
    renderer: Arc<dyn Renderer>,
    bus: Arc<EventBus>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    /// Cloned into every spawned render task; settlements come back here.
    done_tx: mpsc::UnboundedSender<Settlement>,
    done_rx: mpsc::UnboundedReceiver<Settlement>,
    cancel: CancellationToken,
    stop_timeout: Duration,
    in_flight: Option<CurrentJob>,
}

impl DispatchLoop {
    async fn run(mut self) {
        tracing::info!(
            max_queue_depth = self.queue.max_depth(),
            stop_timeout_ms = self.stop_timeout.as_millis() as u64,
            "Dispatch loop started",
        );

        loop {
            tokio::select! {
                Some(settlement) = self.done_rx.recv() => {
                    self.on_settled(settlement);
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => {
                        // Every handle is gone; nobody can submit again.
                        self.wind_down().await;
                        break;
                    }
                },
                _ = self.cancel.cancelled() => {
                    tracing::info!("Dispatch loop shutting down");
                    self.wind_down().await;
                    break;
                }
            }
        }

        tracing::info!("Dispatch loop stopped");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(job) => self.on_submit(job).await,
            Command::StopAll => self.on_stop_all().await,
            Command::Status(reply) => {
                let _ = reply.send(DispatcherStatus {
                    busy: self.in_flight.is_some(),
                    queue_depth: self.queue.depth(),
                });
            }
        }
    }

    async fn on_submit(&mut self, job: Job) {
        let busy = self.in_flight.is_some();
        let state = QueueState {
            queue_is_empty: self.queue.is_empty(),
            dispatcher_is_busy: busy,
        };
        let action = policy::resolve(job.priority(), state);
        tracing::debug!(
            id = %job.id(),
            kind = %job.kind(),
            priority = %job.priority(),
            action = ?action,
            queue_depth = self.queue.depth(),
            "Job submitted",
        );

        match action {
            QueueAction::Append => {
                if let Some(evicted) = self.queue.append(job) {
                    self.report_drop(evicted, DropReason::Overflow);
                }
            }
            QueueAction::InsertFront => {
                if let Some(evicted) = self.queue.insert_front(job) {
                    self.report_drop(evicted, DropReason::Overflow);
                }
            }
            QueueAction::AppendIfIdle => match self.queue.append_if_idle(job, busy) {
                Ok(Some(evicted)) => self.report_drop(evicted, DropReason::Overflow),
                Ok(None) => {}
                Err(shed) => self.report_drop(shed, DropReason::LowPriorityBusy),
            },
            QueueAction::FlushAndReplace => {
                for dropped in self.queue.flush_and_replace(job) {
                    self.report_drop(dropped, DropReason::Interrupted);
                }
                if busy {
                    // Await delivery before touching the queue again so the
                    // stop can only ever land on the job it was aimed at.
                    self.request_stop().await;
                }
            }
        }

        if !busy {
            self.start_next();
        }
    }

    async fn on_stop_all(&mut self) {
        let pending = self.queue.clear();
        tracing::info!(dropped = pending.len(), "Stop requested");
        for job in pending {
            self.report_drop(job, DropReason::Interrupted);
        }
        if self.in_flight.is_some() {
            self.request_stop().await;
        }
    }

    /// Handle the settlement of the in-flight job and advance the queue.
    /// This is the only place the busy-to-idle edge can happen, so the idle
    /// event fires exactly once per drain.
    fn on_settled(&mut self, settlement: Settlement) {
        debug_assert!(
            self.in_flight
                .as_ref()
                .is_some_and(|current| current.id == settlement.id),
            "settlement for a job that does not hold the slot",
        );
        self.in_flight = None;

        match settlement.result {
            Ok(()) => {
                tracing::info!(id = %settlement.id, kind = %settlement.kind, "Job completed");
                self.bus
                    .publish(DisplayEvent::job_completed(settlement.id, settlement.kind));
            }
            Err(error) => {
                tracing::warn!(
                    id = %settlement.id,
                    kind = %settlement.kind,
                    error = %error,
                    "Job failed",
                );
                self.bus.publish(DisplayEvent::job_failed(
                    settlement.id,
                    settlement.kind,
                    error.to_string(),
                ));
            }
        }

        if self.queue.is_empty() {
            tracing::info!("Queue drained, display idle");
            self.bus.publish(DisplayEvent::idle());
        } else {
            self.start_next();
        }
    }

    /// Pop the queue head into the display slot and spawn its render task.
    fn start_next(&mut self) {
        debug_assert!(self.in_flight.is_none(), "display slot is already taken");
        let Some(job) = self.queue.pop_front() else {
            return;
        };

        let id = job.id();
        let kind = job.kind();
        self.in_flight = Some(CurrentJob { id, kind });
        tracing::info!(id = %id, kind = %kind, "Job started");
        self.bus.publish(DisplayEvent::job_started(id, kind));

        let renderer = Arc::clone(&self.renderer);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(renderer.execute(&job)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(RenderError::Failed("renderer panicked".to_string())),
            };
            // The loop outlives render tasks except during shutdown, where
            // dropping the settlement is fine.
            let _ = done_tx.send(Settlement { id, kind, result });
        });
    }

    /// Ask the renderer to wind down the in-flight job. Settlement still
    /// arrives through the normal path; on timeout the slot stays busy.
    async fn request_stop(&self) {
        if tokio::time::timeout(self.stop_timeout, self.renderer.stop())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_ms = self.stop_timeout.as_millis() as u64,
                "Renderer did not acknowledge stop; keeping the slot busy until the job settles",
            );
        }
    }

    fn report_drop(&self, job: Job, reason: DropReason) {
        tracing::info!(id = %job.id(), kind = %job.kind(), reason = %reason, "Job dropped");
        self.bus
            .publish(DisplayEvent::job_dropped(job.id(), job.kind(), reason));
    }

    /// Best-effort wind-down of the in-flight job during shutdown.
    async fn wind_down(&mut self) {
        let Some(current) = self.in_flight.take() else {
            return;
        };
        tracing::info!(id = %current.id, "Stopping in-flight job for shutdown");
        self.request_stop().await;
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.done_rx.recv())
            .await
            .is_err()
        {
            tracing::warn!(id = %current.id, "In-flight job did not settle during shutdown");
        }
    }
}
