//! Narration chunking.
//!
//! Splits a narration script into ordered [`ScriptChunk`]s whose estimated
//! speaking time falls inside a target band. Chunks prefer to close on a
//! sentence boundary once the band minimum is reached, are force-split at the
//! band maximum, and the final chunk is flushed even when short.
//!
//! Rejoining every chunk's text with single spaces reproduces the
//! whitespace-normalized input exactly.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Assumed narration speaking rate.
pub const DEFAULT_WORDS_PER_SECOND: f64 = 2.5;

/// Lower edge of the target chunk duration band (seconds).
pub const DEFAULT_MIN_CHUNK_SECS: f64 = 9.0;

/// Upper edge of the target chunk duration band (seconds).
pub const DEFAULT_MAX_CHUNK_SECS: f64 = 18.0;

/// Characters that end a sentence.
const SENTENCE_TERMINALS: &[char] = &['.', '!', '?'];

/// Closing characters that may trail a sentence terminal (`end."`, `(done!)`).
const TRAILING_CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A contiguous span of narration with its estimated speaking duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptChunk {
    pub id: String,
    pub text: String,
    pub word_count: usize,
    /// Estimated speaking time in seconds, rounded to two decimals.
    pub duration_estimate: f64,
}

/// Speaking rate and duration band used by [`chunk_script`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub words_per_second: f64,
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            min_secs: DEFAULT_MIN_CHUNK_SECS,
            max_secs: DEFAULT_MAX_CHUNK_SECS,
        }
    }
}

impl ChunkingConfig {
    /// Reject rates and bands that would make chunking meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        let all_finite = [self.words_per_second, self.min_secs, self.max_secs]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(CoreError::Validation(
                "chunking parameters must be finite numbers".to_string(),
            ));
        }
        if self.words_per_second <= 0.0 {
            return Err(CoreError::Validation(format!(
                "words_per_second must be > 0, got {}",
                self.words_per_second
            )));
        }
        if self.min_secs <= 0.0 || self.max_secs < self.min_secs {
            return Err(CoreError::Validation(format!(
                "chunk band must satisfy 0 < min <= max, got {}..{}",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }

    /// Estimated speaking time for `words` words.
    pub fn duration_for(&self, words: usize) -> f64 {
        words as f64 / self.words_per_second
    }
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split `script` into timed chunks.
///
/// Empty or whitespace-only input yields an empty list. Otherwise no chunk is
/// empty and the chunk texts, joined with single spaces, equal the input
/// after whitespace normalization.
pub fn chunk_script(script: &str, config: &ChunkingConfig) -> Result<Vec<ScriptChunk>, CoreError> {
    config.validate()?;

    let words: Vec<&str> = script.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word);

        let duration = config.duration_for(current.len());
        let is_last = i + 1 == words.len();
        let at_max = duration >= config.max_secs;
        let at_boundary = duration >= config.min_secs && ends_sentence(word);

        if at_max || at_boundary || is_last {
            chunks.push(ScriptChunk {
                id: format!("chunk-{}", chunks.len() + 1),
                text: current.join(" "),
                word_count: current.len(),
                duration_estimate: round2(duration),
            });
            current.clear();
        }
    }

    Ok(chunks)
}

/// Whitespace-normalized form of a script: words joined by single spaces.
pub fn normalize_script(script: &str) -> String {
    script.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `word` ends with sentence-terminal punctuation, ignoring closing
/// quotes and brackets.
fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(TRAILING_CLOSERS)
        .ends_with(SENTENCE_TERMINALS)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(script: &str) -> Vec<ScriptChunk> {
        chunk_script(script, &ChunkingConfig::default()).unwrap()
    }

    fn words(n: usize, terminal_every: Option<usize>) -> String {
        (1..=n)
            .map(|i| match terminal_every {
                Some(k) if i % k == 0 => format!("w{i}."),
                _ => format!("w{i}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk("").is_empty());
        assert!(chunk("   \n\t ").is_empty());
    }

    #[test]
    fn short_leading_sentence_merges_forward() {
        let script = "Hello world. This is a test sentence that runs long enough to reach the lower band threshold.";
        let chunks = chunk(script);

        // "Hello world." is 0.8s and must not close a chunk on its own.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, script);
        assert_eq!(chunks[0].word_count, 17);
        assert_eq!(chunks[0].duration_estimate, 6.8);
    }

    #[test]
    fn closes_on_sentence_boundary_after_minimum() {
        // 25 words (10s) ending in a period, then 10 more words.
        let script = format!("{} tail1 tail2 tail3 tail4 tail5 tail6 tail7 tail8 tail9 tail10", words(25, Some(25)));
        let chunks = chunk(&script);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].word_count, 25);
        assert_eq!(chunks[0].duration_estimate, 10.0);
        assert!(chunks[0].text.ends_with("w25."));
        assert_eq!(chunks[1].word_count, 10);
    }

    #[test]
    fn sentence_boundary_before_minimum_does_not_close() {
        // Period at word 20 (8s) is below the 9s minimum.
        let script = words(30, Some(20));
        let chunks = chunk(&script);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].word_count, 30);
    }

    #[test]
    fn run_on_sentence_is_force_split_at_maximum() {
        let chunks = chunk(&words(100, None));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].word_count, 45);
        assert_eq!(chunks[0].duration_estimate, 18.0);
        assert_eq!(chunks[1].word_count, 45);
        assert_eq!(chunks[2].word_count, 10);
        assert_eq!(chunks[2].duration_estimate, 4.0);
    }

    #[test]
    fn rejoined_chunks_reproduce_normalized_input() {
        let scripts = [
            "One.  Two!\nThree?  ".to_string(),
            words(97, Some(7)),
            words(250, None),
            format!("  {}\n\n{}  ", words(40, Some(13)), words(61, Some(22))),
        ];
        for script in &scripts {
            let chunks = chunk(script);
            let rejoined = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            assert_eq!(rejoined, normalize_script(script));
            assert!(chunks.iter().all(|c| !c.text.is_empty()));
        }
    }

    #[test]
    fn no_chunk_exceeds_twice_the_maximum() {
        let config = ChunkingConfig::default();
        for n in [1, 44, 45, 46, 90, 91, 500] {
            for terminal in [None, Some(3), Some(31), Some(50)] {
                for c in chunk_script(&words(n, terminal), &config).unwrap() {
                    assert!(c.duration_estimate <= 2.0 * config.max_secs);
                }
            }
        }
    }

    #[test]
    fn chunk_ids_are_sequential() {
        let chunks = chunk(&words(120, None));
        let ids: Vec<_> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["chunk-1", "chunk-2", "chunk-3"]);
    }

    #[test]
    fn terminal_inside_closing_quote_counts_as_boundary() {
        let script = format!("{} \"done.\" after", words(24, None));
        let chunks = chunk(&script);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("\"done.\""));
        assert_eq!(chunks[1].text, "after");
    }

    #[test]
    fn durations_are_rounded_to_two_decimals() {
        let config = ChunkingConfig {
            words_per_second: 3.0,
            ..ChunkingConfig::default()
        };
        let chunks = chunk_script("a b c d", &config).unwrap();
        assert_eq!(chunks[0].duration_estimate, 1.33);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let zero_rate = ChunkingConfig {
            words_per_second: 0.0,
            ..ChunkingConfig::default()
        };
        assert!(chunk_script("hello", &zero_rate).is_err());

        let inverted = ChunkingConfig {
            min_secs: 20.0,
            max_secs: 10.0,
            ..ChunkingConfig::default()
        };
        assert!(chunk_script("hello", &inverted).is_err());

        let nan = ChunkingConfig {
            max_secs: f64::NAN,
            ..ChunkingConfig::default()
        };
        assert!(nan.validate().is_err());
    }
}
