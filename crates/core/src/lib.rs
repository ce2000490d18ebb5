//! Shortreel domain core.
//!
//! Pure building blocks shared by every other crate:
//!
//! - [`stage`]: the fixed stage order and project status values.
//! - [`chunker`]: splitting narration into timed chunks.
//! - [`aligner`]: storyboard segments and alignment to measured audio.
//! - [`captions`]: ASS caption-track encoding.
//! - [`wav`]: RIFF/WAVE framing of synthesized PCM.
//! - [`ffmpeg`]: ffmpeg helpers for compression and rendering.
//! - [`stage_data`]: typed per-stage payloads.

pub mod aligner;
pub mod captions;
pub mod chunker;
pub mod error;
pub mod ffmpeg;
pub mod profile;
pub mod stage;
pub mod stage_data;
pub mod types;
pub mod wav;

pub use error::CoreError;
pub use stage::{ProjectStatus, Stage, STAGE_ORDER};
pub use stage_data::{StageData, StagePayload};
pub use types::{ChannelId, ProjectId, Timestamp};
