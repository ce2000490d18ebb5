//! Per-stage output payloads and the append-only map that holds them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::aligner::StoryboardSegment;
use crate::chunker::ScriptChunk;
use crate::error::CoreError;
use crate::stage::Stage;

/// A typed stage output stored under its stage's data key.
pub trait StagePayload: Serialize + DeserializeOwned {
    const STAGE: Stage;
}

/// Accumulated stage outputs of a project, keyed by [`Stage::data_key`].
///
/// Entries are inserted or overwritten in place; nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageData(BTreeMap<String, serde_json::Value>);

impl StageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains_key(stage.data_key())
    }

    pub fn raw(&self, stage: Stage) -> Option<&serde_json::Value> {
        self.0.get(stage.data_key())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the payload for `T::STAGE`, if present.
    pub fn get<T: StagePayload>(&self) -> Result<Option<T>, CoreError> {
        self.raw(T::STAGE)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    CoreError::Validation(format!(
                        "stored {} output is malformed: {e}",
                        T::STAGE
                    ))
                })
            })
            .transpose()
    }

    /// Decode the payload for `T::STAGE`, failing when it has not been produced.
    pub fn require<T: StagePayload>(&self) -> Result<T, CoreError> {
        self.get::<T>()?.ok_or_else(|| {
            CoreError::Validation(format!("{} output is missing", T::STAGE))
        })
    }

    pub fn insert<T: StagePayload>(&mut self, payload: &T) -> Result<(), CoreError> {
        let value = serde_json::to_value(payload).map_err(|e| {
            CoreError::Internal(format!("failed to encode {} output: {e}", T::STAGE))
        })?;
        self.insert_raw(T::STAGE, value);
        Ok(())
    }

    pub fn insert_raw(&mut self, stage: Stage, value: serde_json::Value) {
        self.0.insert(stage.data_key().to_string(), value);
    }

    /// Merge `other` into `self`, overwriting shared keys.
    pub fn merge(&mut self, other: StageData) {
        self.0.extend(other.0);
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Approved reference material: a transcript plus whatever provenance the
/// extractor reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    pub source: String,
    pub transcript: String,
    #[serde(default)]
    pub provenance: serde_json::Value,
}

impl StagePayload for ReferenceData {
    const STAGE: Stage = Stage::Reference;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptData {
    pub narration: String,
    pub chunks: Vec<ScriptChunk>,
    #[serde(default)]
    pub visual_prompts: Vec<String>,
    pub metadata: VideoMetadata,
}

impl StagePayload for ScriptData {
    const STAGE: Stage = Stage::Script;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioData {
    /// Blob key of the WAV file.
    pub key: String,
    pub sample_rate: u32,
    pub byte_length: u64,
    /// Measured duration; the authoritative total for alignment.
    pub duration_secs: f64,
}

impl StagePayload for AudioData {
    const STAGE: Stage = Stage::Audio;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCompressData {
    pub key: String,
    pub source_key: String,
    pub byte_length: u64,
}

impl StagePayload for AudioCompressData {
    const STAGE: Stage = Stage::AudioCompress;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitlesData {
    pub segments: Vec<StoryboardSegment>,
    pub caption_key: String,
    pub event_count: usize,
    pub total_duration_secs: f64,
}

impl StagePayload for SubtitlesData {
    const STAGE: Stage = Stage::Subtitles;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesData {
    pub segments: Vec<StoryboardSegment>,
}

impl StagePayload for ImagesData {
    const STAGE: Stage = Stage::Images;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderData {
    pub key: String,
    pub duration_secs: f64,
}

impl StagePayload for RenderData {
    const STAGE: Stage = Stage::Render;
}
