//! Renderer seam and the simulated display device.
//!
//! The dispatch loop only ever talks to [`Renderer`], so the engine can be
//! tested against scripted fakes and the binary can run headless:
//!
//! - [`Renderer`] -- one in-flight operation at a time, cooperative stop.
//! - [`SimRenderer`] -- timing-faithful stand-in for the LED panel.
//! - [`AssetLibrary`] -- resolves animation, emoji, clock face, and font
//!   files for a given panel geometry.

use async_trait::async_trait;
use marquee_core::Job;

pub mod assets;
pub mod sim;

pub use assets::{AssetError, AssetLibrary};
pub use sim::SimRenderer;

/// Error from a single render operation.
///
/// A render error settles the job that caused it; it never tears down the
/// display slot or the jobs queued behind it.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("render failed: {0}")]
    Failed(String),
}

/// A device that can run one display operation at a time.
///
/// `execute` settles exactly once per job: on natural completion, on render
/// failure, or early after a cooperative [`stop`](Renderer::stop). Callers
/// own the single-slot discipline; implementations are not required to
/// reject overlapping calls.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Runs `job` to settlement.
    async fn execute(&self, job: &Job) -> Result<(), RenderError>;

    /// Asks the device to wind down the in-flight operation. Returns once
    /// the request is delivered; the `execute` future observes it and
    /// settles on its own.
    async fn stop(&self);

    /// Device-side busy flag, for health reporting. The dispatch loop keeps
    /// its own authoritative busy state and never reads this.
    fn is_busy(&self) -> bool;
}
