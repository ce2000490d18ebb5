//! Storyboard segments and duration alignment.
//!
//! Segments start out with the chunker's word-based estimates. Once the
//! narration has been synthesized, [`align_to_audio`] redistributes the
//! measured audio duration across segments in proportion to each segment's
//! non-whitespace character count. Every segment but the last is rounded to
//! hundredths; the final segment absorbs the rounding and floating-point drift
//! so the cumulative end lands exactly on the measured duration.

use serde::{Deserialize, Serialize};

use crate::chunker::{round2, ScriptChunk};
use crate::error::CoreError;

/// One timed block of the storyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardSegment {
    pub id: String,
    /// Display range, e.g. `"0:07 - 0:19"`.
    pub time_range: String,
    /// Duration in seconds.
    pub duration: f64,
    pub script_text: String,
    pub visual_prompt: String,
    /// Blob keys of generated images for this segment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_keys: Vec<String>,
}

/// Pair chunks with visual prompts to form the initial storyboard.
///
/// Prompts are assigned by index and cycle when there are fewer prompts than
/// chunks. With no prompts at all, the chunk text doubles as the prompt.
pub fn build_segments(chunks: &[ScriptChunk], visual_prompts: &[String]) -> Vec<StoryboardSegment> {
    let mut segments: Vec<StoryboardSegment> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let visual_prompt = if visual_prompts.is_empty() {
                chunk.text.clone()
            } else {
                visual_prompts[i % visual_prompts.len()].clone()
            };
            StoryboardSegment {
                id: format!("segment-{}", i + 1),
                time_range: String::new(),
                duration: chunk.duration_estimate,
                script_text: chunk.text.clone(),
                visual_prompt,
                image_keys: Vec::new(),
            }
        })
        .collect();
    refresh_time_ranges(&mut segments);
    segments
}

/// Rescale segment durations so they sum to `total_secs`.
///
/// Weights are non-whitespace character counts. When every segment has zero
/// weight the total is split evenly.
pub fn align_to_audio(segments: &mut [StoryboardSegment], total_secs: f64) -> Result<(), CoreError> {
    if segments.is_empty() {
        return Err(CoreError::Validation(
            "cannot align an empty storyboard".to_string(),
        ));
    }
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(CoreError::Validation(format!(
            "total audio duration must be a positive finite number, got {total_secs}"
        )));
    }

    let weights: Vec<usize> = segments
        .iter()
        .map(|s| char_weight(&s.script_text))
        .collect();
    let total_weight: usize = weights.iter().sum();

    let last = segments.len() - 1;
    let mut assigned = 0.0;
    for (i, segment) in segments.iter_mut().enumerate() {
        if i == last {
            segment.duration = (total_secs - assigned).max(0.0);
        } else {
            let share = if total_weight == 0 {
                1.0 / (last + 1) as f64
            } else {
                weights[i] as f64 / total_weight as f64
            };
            segment.duration = round2(total_secs * share).min(total_secs - assigned);
            assigned += segment.duration;
        }
    }

    refresh_time_ranges(segments);
    Ok(())
}

/// Cumulative start time of every segment, in order.
pub fn segment_starts(segments: &[StoryboardSegment]) -> Vec<f64> {
    let mut cursor = 0.0;
    segments
        .iter()
        .map(|s| {
            let start = cursor;
            cursor += s.duration;
            start
        })
        .collect()
}

/// Sum of all segment durations.
pub fn total_duration(segments: &[StoryboardSegment]) -> f64 {
    segments.iter().map(|s| s.duration).sum()
}

/// Format a `[start, end)` range as `M:SS - M:SS`.
pub fn format_time_range(start_secs: f64, end_secs: f64) -> String {
    format!("{} - {}", format_clock(start_secs), format_clock(end_secs))
}

fn format_clock(secs: f64) -> String {
    let whole = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

fn refresh_time_ranges(segments: &mut [StoryboardSegment]) {
    let starts = segment_starts(segments);
    for (segment, start) in segments.iter_mut().zip(starts) {
        segment.time_range = format_time_range(start, start + segment.duration);
    }
}

fn char_weight(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
