//! Engine configuration, injected into the engine and every stage context.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shortreel_core::chunker::ChunkingConfig;
use shortreel_core::wav::DEFAULT_SAMPLE_RATE;

use crate::error::PipelineError;

/// A secret a stage handler may need before calling its collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credential {
    TextApiKey,
    SpeechApiKey,
    ImageApiKey,
    TranscriptToken,
}

impl Credential {
    pub const ALL: [Credential; 4] = [
        Self::TextApiKey,
        Self::SpeechApiKey,
        Self::ImageApiKey,
        Self::TranscriptToken,
    ];

    /// Environment variable the credential is read from.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::TextApiKey => "TEXT_API_KEY",
            Self::SpeechApiKey => "SPEECH_API_KEY",
            Self::ImageApiKey => "IMAGE_API_KEY",
            Self::TranscriptToken => "TRANSCRIPT_TOKEN",
        }
    }
}

/// Resolved credentials. Blank values count as missing.
#[derive(Clone, Default)]
pub struct Credentials(HashMap<Credential, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential: Credential, value: impl Into<String>) -> Self {
        self.set(credential, value);
        self
    }

    pub fn set(&mut self, credential: Credential, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.0.remove(&credential);
        } else {
            self.0.insert(credential, value);
        }
    }

    pub fn get(&self, credential: Credential) -> Option<&str> {
        self.0.get(&credential).map(String::as_str)
    }

    pub fn require(&self, credential: Credential) -> Result<&str, PipelineError> {
        self.get(credential)
            .ok_or_else(|| PipelineError::Configuration(credential.env_var().to_string()))
    }

    /// Which credentials are configured, without exposing their values.
    pub fn presence(&self) -> Vec<(Credential, bool)> {
        Credential::ALL
            .iter()
            .map(|c| (*c, self.0.contains_key(c)))
            .collect()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let configured: Vec<_> = Credential::ALL
            .iter()
            .filter(|c| self.0.contains_key(c))
            .map(|c| c.env_var())
            .collect();
        f.debug_struct("Credentials")
            .field("configured", &configured)
            .finish()
    }
}

/// Bounds for transcript-job polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub max_polls: u32,
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_polls: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// Everything the engine and stage handlers read from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the generation gateway.
    pub gateway_url: String,
    pub credentials: Credentials,
    /// Sample rate requested from the speech synthesizer.
    pub speech_sample_rate: u32,
    pub chunking: ChunkingConfig,
    /// Leases older than this may be taken over.
    pub lease_ttl: Duration,
    pub transcript_polling: PollingConfig,
    /// Root for blobs, cache records and ffmpeg scratch space.
    pub data_dir: PathBuf,
    pub profiles_path: PathBuf,
    /// Durable store; without it only the local cache is used.
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            credentials: Credentials::new(),
            speech_sample_rate: DEFAULT_SAMPLE_RATE,
            chunking: ChunkingConfig::default(),
            lease_ttl: Duration::from_secs(30 * 60),
            transcript_polling: PollingConfig::default(),
            data_dir: PathBuf::from("./data"),
            profiles_path: PathBuf::from("./profiles.json"),
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default           |
    /// |---------------------------------|-------------------|
    /// | `GATEWAY_URL`                   | `http://localhost:8080` |
    /// | `TEXT_API_KEY`, `SPEECH_API_KEY`, `IMAGE_API_KEY`, `TRANSCRIPT_TOKEN` | unset |
    /// | `SPEECH_SAMPLE_RATE`            | `24000`           |
    /// | `CHUNK_WORDS_PER_SECOND`        | `2.5`             |
    /// | `CHUNK_MIN_SECS`                | `9`               |
    /// | `CHUNK_MAX_SECS`                | `18`              |
    /// | `LEASE_TTL_SECS`                | `1800`            |
    /// | `TRANSCRIPT_MAX_POLLS`          | `30`              |
    /// | `TRANSCRIPT_POLL_INTERVAL_SECS` | `2`               |
    /// | `DATA_DIR`                      | `./data`          |
    /// | `PROFILES_PATH`                 | `./profiles.json` |
    /// | `DATABASE_URL`                  | unset             |
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut credentials = Credentials::new();
        for credential in Credential::ALL {
            if let Some(value) = var(credential.env_var()) {
                credentials.set(credential, value);
            }
        }

        let chunking = ChunkingConfig {
            words_per_second: parse_or(&var, "CHUNK_WORDS_PER_SECOND", defaults.chunking.words_per_second)?,
            min_secs: parse_or(&var, "CHUNK_MIN_SECS", defaults.chunking.min_secs)?,
            max_secs: parse_or(&var, "CHUNK_MAX_SECS", defaults.chunking.max_secs)?,
        };
        chunking
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let speech_sample_rate: u32 =
            parse_or(&var, "SPEECH_SAMPLE_RATE", defaults.speech_sample_rate)?;
        if speech_sample_rate == 0 {
            return Err(PipelineError::Configuration(
                "SPEECH_SAMPLE_RATE must be > 0".to_string(),
            ));
        }

        Ok(Self {
            gateway_url: var("GATEWAY_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gateway_url),
            credentials,
            speech_sample_rate,
            chunking,
            lease_ttl: Duration::from_secs(parse_or(
                &var,
                "LEASE_TTL_SECS",
                defaults.lease_ttl.as_secs(),
            )?),
            transcript_polling: PollingConfig {
                max_polls: parse_or(&var, "TRANSCRIPT_MAX_POLLS", defaults.transcript_polling.max_polls)?,
                interval: Duration::from_secs(parse_or(
                    &var,
                    "TRANSCRIPT_POLL_INTERVAL_SECS",
                    defaults.transcript_polling.interval.as_secs(),
                )?),
            },
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            profiles_path: var("PROFILES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.profiles_path),
            database_url: var("DATABASE_URL"),
        })
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("projects")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("work")
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, PipelineError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            PipelineError::Configuration(format!("{name} has an invalid value '{raw}'"))
        }),
    }
}
