//! Simulated display device.
//!
//! [`SimRenderer`] resolves the same assets and holds the display slot for
//! the same wall-clock time a real panel would, without touching hardware.
//! That keeps the dispatch behaviour (queueing, interrupts, idle edges)
//! observable on any machine.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use marquee_core::{Job, JobPayload};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::assets::AssetLibrary;
use crate::{RenderError, Renderer};

// ---------------------------------------------------------------------------
// Timing model
// ---------------------------------------------------------------------------

/// Horizontal scroll rate of the text effect.
const SCROLL_PX_PER_SEC: f32 = 24.0;

/// Average advance of one glyph in the default face.
const GLYPH_ADVANCE_PX: f32 = 6.0;

/// Playback time for a GIF whose frame metadata cannot be read.
const DEFAULT_ANIMATION_SECS: f32 = 10.0;

/// Hold time for a static emoji.
const DEFAULT_EMOJI_SECS: f32 = 5.0;

/// Hold time for a clock face.
const DEFAULT_CLOCK_SECS: f32 = 60.0;

/// Run time for the generative effects (rain, perlin).
const DEFAULT_EFFECT_SECS: f32 = 30.0;

/// Per-frame delay applied when a GIF declares none. Viewers treat
/// zero-delay frames as 100ms, so playback timing matches what people see.
const FALLBACK_FRAME_MS: f64 = 100.0;

/// Time a scrolling text occupies the panel: the full text has to travel
/// across the panel width.
fn scroll_duration(glyphs: usize, panel_width: u32) -> Duration {
    let travel_px = panel_width as f32 + glyphs as f32 * GLYPH_ADVANCE_PX;
    Duration::from_secs_f32(travel_px / SCROLL_PX_PER_SEC)
}

/// A client-requested hold time, if it is usable as one.
fn requested_hold(requested: Option<f32>) -> Option<Duration> {
    requested
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f32)
}

fn hold(requested: Option<f32>, default_secs: f32) -> Duration {
    requested_hold(requested).unwrap_or_else(|| Duration::from_secs_f32(default_secs))
}

/// Total playback time of a GIF, from its per-frame delays.
fn gif_duration(path: &Path) -> Option<Duration> {
    let file = std::fs::File::open(path).ok()?;
    let decoder = GifDecoder::new(BufReader::new(file)).ok()?;

    let mut total_ms = 0.0f64;
    let mut frames = 0u32;
    for frame in decoder.into_frames() {
        let frame = frame.ok()?;
        let (numer, denom) = frame.delay().numer_denom_ms();
        let ms = if denom == 0 {
            FALLBACK_FRAME_MS
        } else {
            f64::from(numer) / f64::from(denom)
        };
        total_ms += if ms > 0.0 { ms } else { FALLBACK_FRAME_MS };
        frames += 1;
    }

    if frames == 0 {
        return None;
    }
    Some(Duration::from_millis(total_ms.round() as u64))
}

// ---------------------------------------------------------------------------
// SimRenderer
// ---------------------------------------------------------------------------

/// What one render operation will do, decided up front so asset problems
/// fail the job before it takes the slot.
struct RenderPlan {
    duration: Duration,
    asset: Option<PathBuf>,
}

/// Timing-faithful simulation of the LED panel.
pub struct SimRenderer {
    assets: AssetLibrary,
    busy: AtomicBool,
    /// Stop token for the in-flight operation. Replaced at the start of
    /// every `execute`, cancelled by `stop`.
    current: Mutex<CancellationToken>,
}

impl SimRenderer {
    pub fn new(assets: AssetLibrary) -> Self {
        Self {
            assets,
            busy: AtomicBool::new(false),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    fn plan(&self, job: &Job) -> Result<RenderPlan, RenderError> {
        let plan = match job.payload() {
            JobPayload::Text(opts) => {
                let asset = match &opts.font_name {
                    Some(font) => Some(self.assets.font(font)?),
                    None => None,
                };
                RenderPlan {
                    duration: scroll_duration(opts.text.chars().count(), self.assets.width()),
                    asset,
                }
            }
            JobPayload::Animation(opts) => {
                let path = self.assets.animation(opts.name.as_deref())?;
                let duration = requested_hold(opts.duration)
                    .or_else(|| gif_duration(&path))
                    .unwrap_or_else(|| Duration::from_secs_f32(DEFAULT_ANIMATION_SECS));
                RenderPlan {
                    duration,
                    asset: Some(path),
                }
            }
            JobPayload::Emoji(opts) => RenderPlan {
                duration: hold(opts.duration, DEFAULT_EMOJI_SECS),
                asset: Some(self.assets.emoji(opts.id)?),
            },
            JobPayload::Rain(opts) => RenderPlan {
                duration: hold(opts.duration, DEFAULT_EFFECT_SECS),
                asset: None,
            },
            JobPayload::Perlin(opts) => RenderPlan {
                duration: hold(opts.duration, DEFAULT_EFFECT_SECS),
                asset: None,
            },
            JobPayload::Clock(opts) => RenderPlan {
                duration: hold(opts.duration, DEFAULT_CLOCK_SECS),
                asset: Some(self.assets.clock_face(opts.name.as_deref())?),
            },
        };
        Ok(plan)
    }
}

#[async_trait]
impl Renderer for SimRenderer {
    async fn execute(&self, job: &Job) -> Result<(), RenderError> {
        let plan = self.plan(job)?;

        let token = CancellationToken::new();
        *self.current.lock().await = token.clone();
        self.busy.store(true, Ordering::SeqCst);

        let asset = plan
            .asset
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .unwrap_or("-");
        tracing::debug!(
            kind = %job.kind(),
            asset,
            duration_ms = plan.duration.as_millis() as u64,
            "Rendering"
        );

        tokio::select! {
            _ = tokio::time::sleep(plan.duration) => {}
            _ = token.cancelled() => {
                tracing::debug!(kind = %job.kind(), "Render stopped early");
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.current.lock().await.cancel();
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, RgbaImage};
    use marquee_core::job::{AnimationOptions, RainOptions, TextOptions};
    use marquee_core::Priority;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn sim() -> (tempfile::TempDir, Arc<SimRenderer>) {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = SimRenderer::new(AssetLibrary::new(tmp.path(), 32, 32));
        (tmp, Arc::new(renderer))
    }

    fn rain(duration: Option<f32>) -> Job {
        Job::new(JobPayload::Rain(RainOptions { duration }), Priority::Normal)
    }

    #[test]
    fn longer_text_scrolls_for_longer() {
        let short = scroll_duration(0, 32);
        let long = scroll_duration(40, 32);
        assert!(long > short);
        // 32px of panel plus 40 glyphs at 6px each, at 24px/s.
        assert_eq!(long, Duration::from_secs_f32(272.0 / 24.0));
    }

    #[test]
    fn unusable_hold_requests_fall_back_to_defaults() {
        assert_eq!(requested_hold(None), None);
        assert_eq!(requested_hold(Some(0.0)), None);
        assert_eq!(requested_hold(Some(-3.0)), None);
        assert_eq!(requested_hold(Some(f32::NAN)), None);
        assert_eq!(requested_hold(Some(2.5)), Some(Duration::from_secs_f32(2.5)));

        assert_eq!(
            hold(None, DEFAULT_EFFECT_SECS),
            Duration::from_secs_f32(DEFAULT_EFFECT_SECS)
        );
    }

    #[test]
    fn gif_duration_sums_frame_delays() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("anim.gif");

        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = GifEncoder::new(file);
        for _ in 0..3 {
            let frame = Frame::from_parts(
                RgbaImage::new(4, 4),
                0,
                0,
                Delay::from_numer_denom_ms(200, 1),
            );
            encoder.encode_frame(frame).unwrap();
        }
        drop(encoder);

        assert_eq!(gif_duration(&path), Some(Duration::from_millis(600)));
    }

    #[test]
    fn gif_duration_rejects_non_gif_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.gif");
        std::fs::write(&path, b"definitely not a gif").unwrap();
        assert_eq!(gif_duration(&path), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rain_settles_after_its_hold_time() {
        let (_tmp, renderer) = sim();
        renderer.execute(&rain(Some(30.0))).await.unwrap();
        assert!(!renderer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_animation_fails_without_taking_the_slot() {
        let (_tmp, renderer) = sim();
        let job = Job::new(
            JobPayload::Animation(AnimationOptions {
                name: Some("missing".to_string()),
                duration: None,
            }),
            Priority::Normal,
        );
        let result = renderer.execute(&job).await;
        assert!(matches!(result, Err(RenderError::Asset(_))));
        assert!(!renderer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_font_fails_the_text_job() {
        let (_tmp, renderer) = sim();
        let job = Job::new(
            JobPayload::Text(TextOptions {
                text: "hi".to_string(),
                font_name: Some("nope".to_string()),
            }),
            Priority::Normal,
        );
        assert!(matches!(
            renderer.execute(&job).await,
            Err(RenderError::Asset(_))
        ));
    }

    #[tokio::test]
    async fn stop_settles_the_in_flight_job_early() {
        let (_tmp, renderer) = sim();
        let job = rain(Some(30.0));

        let handle = {
            let renderer = Arc::clone(&renderer);
            tokio::spawn(async move { renderer.execute(&job).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(renderer.is_busy());

        let stopped_at = Instant::now();
        renderer.stop().await;
        handle.await.unwrap().unwrap();

        assert!(stopped_at.elapsed() < Duration::from_secs(5));
        assert!(!renderer.is_busy());
    }
}
