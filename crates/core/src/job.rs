//! Job vocabulary: identifiers, payloads, and priority classes.
//!
//! A [`Job`] is immutable once constructed. Everything the renderer needs is
//! captured at submission time so the dispatch loop never has to reach back
//! into connection state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UnknownPriority;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique job identifier, assigned when the job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Kinds and payloads
// ---------------------------------------------------------------------------

/// The category of work a job asks the display to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Text,
    Animation,
    Emoji,
    Rain,
    Perlin,
    Clock,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Text => "text",
            JobKind::Animation => "animation",
            JobKind::Emoji => "emoji",
            JobKind::Rain => "rain",
            JobKind::Perlin => "perlin",
            JobKind::Clock => "clock",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a scrolling text job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextOptions {
    pub text: String,
    /// Font file stem under the font directory. The renderer's default face
    /// is used when absent.
    pub font_name: Option<String>,
}

/// Options for a GIF animation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationOptions {
    /// Animation file stem. A random animation is picked when absent.
    pub name: Option<String>,
    /// Playback time in seconds, overriding the GIF's own frame timing.
    pub duration: Option<f32>,
}

/// Options for a single emoji image job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmojiOptions {
    /// Emoji sheet index. Absent or out-of-range values fall back to the
    /// stock smiley.
    pub id: Option<u32>,
    pub duration: Option<f32>,
}

/// Options for the falling-rain effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RainOptions {
    pub duration: Option<f32>,
}

/// Options for the Perlin-noise effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerlinOptions {
    pub duration: Option<f32>,
}

/// Options for an analog clock face job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClockOptions {
    /// Clock face file stem. A random face is picked when absent.
    pub name: Option<String>,
    pub duration: Option<f32>,
}

/// Closed union of everything the display knows how to run.
///
/// Each variant owns its options struct, so a payload is self-describing
/// and adding a new effect cannot silently widen an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options", rename_all = "lowercase")]
pub enum JobPayload {
    Text(TextOptions),
    Animation(AnimationOptions),
    Emoji(EmojiOptions),
    Rain(RainOptions),
    Perlin(PerlinOptions),
    Clock(ClockOptions),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Text(_) => JobKind::Text,
            JobPayload::Animation(_) => JobKind::Animation,
            JobPayload::Emoji(_) => JobKind::Emoji,
            JobPayload::Rain(_) => JobKind::Rain,
            JobPayload::Perlin(_) => JobKind::Perlin,
            JobPayload::Clock(_) => JobKind::Clock,
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority class attached to a submission.
///
/// The class decides how the job enters the queue, not how fast it renders.
/// See [`crate::policy`] for the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// Append at the tail.
    #[default]
    Normal,
    /// Jump the pending queue, after the in-flight job.
    High,
    /// Only worth showing if the display is idle right now.
    Low,
    /// Replace everything, including the in-flight job.
    Interrupt,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Low => "low",
            Priority::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownPriority;

    /// Parses a wire-level priority label. `"!"` is the legacy shorthand
    /// for `interrupt` and is still accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "low" => Ok(Priority::Low),
            "interrupt" | "!" => Ok(Priority::Interrupt),
            other => Err(UnknownPriority(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of display work travelling through the queue.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    payload: JobPayload,
    priority: Priority,
    submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(payload: JobPayload, priority: Priority) -> Self {
        Self {
            id: JobId::new(),
            payload,
            priority,
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
