//! Pipeline stage order and project status values.
//!
//! The stage order is fixed: a project's `current_stage` only ever moves
//! forward along [`STAGE_ORDER`]. Optional stages may be short-circuited by
//! the engine when their precondition is absent, but never reordered.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One named step of the content pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Reference,
    Script,
    Audio,
    AudioCompress,
    Subtitles,
    Images,
    Render,
    Done,
}

/// The fixed, linear stage order.
pub const STAGE_ORDER: &[Stage] = &[
    Stage::Reference,
    Stage::Script,
    Stage::Audio,
    Stage::AudioCompress,
    Stage::Subtitles,
    Stage::Images,
    Stage::Render,
    Stage::Done,
];

impl Stage {
    /// The first stage of every new project.
    pub const FIRST: Stage = Stage::Reference;

    /// Zero-based position in [`STAGE_ORDER`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The stage that follows this one. `Done` is terminal and maps to itself.
    pub fn next(self) -> Stage {
        STAGE_ORDER
            .get(self.index() + 1)
            .copied()
            .unwrap_or(Stage::Done)
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Done
    }

    /// Canonical upper-case name, used in persisted records and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Reference => "REFERENCE",
            Self::Script => "SCRIPT",
            Self::Audio => "AUDIO",
            Self::AudioCompress => "AUDIO_COMPRESS",
            Self::Subtitles => "SUBTITLES",
            Self::Images => "IMAGES",
            Self::Render => "RENDER",
            Self::Done => "DONE",
        }
    }

    /// Key under which this stage's output lives in a project's stage data.
    pub fn data_key(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Script => "script",
            Self::Audio => "audio",
            Self::AudioCompress => "audioCompress",
            Self::Subtitles => "subtitles",
            Self::Images => "images",
            Self::Render => "render",
            Self::Done => "done",
        }
    }

    /// Parse from the canonical upper-case name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        STAGE_ORDER
            .iter()
            .copied()
            .find(|s| s.name() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown stage '{name}'")))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ProjectStatus
// ---------------------------------------------------------------------------

/// Run status of a project at its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    /// Idle; the current stage may be run.
    Ready,
    /// A run holds the project's lease.
    Processing,
    /// The current stage's output awaits human approval.
    Review,
    /// The last run of the current stage failed; re-running retries it.
    Error,
}

impl ProjectStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Processing => "PROCESSING",
            Self::Review => "REVIEW",
            Self::Error => "ERROR",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "READY" => Ok(Self::Ready),
            "PROCESSING" => Ok(Self::Processing),
            "REVIEW" => Ok(Self::Review),
            "ERROR" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown project status '{other}'"
            ))),
        }
    }

    /// Whether a run may start from this status.
    ///
    /// `Processing` is excluded; the lease decides whether a stale run can be
    /// taken over. `Review` needs an approval, not a run.
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
