//! Contracts for the external systems stage handlers call.
//!
//! Every collaborator is an object-safe async trait so production
//! implementations (HTTP gateway, filesystem, ffmpeg) and test fakes can be
//! swapped behind `Arc<dyn ...>`. Credentials are passed per call; no
//! implementation reads the environment.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shortreel_core::profile::ChannelProfile;
use shortreel_core::stage_data::VideoMetadata;

use crate::blob::LocalBlobStore;
use crate::config::EngineConfig;
use crate::error::CollaboratorError;
use crate::gateway::HttpGateway;
use crate::media::FfmpegToolkit;
use crate::profiles::JsonFileProfileProvider;
use crate::transcript::PollingTranscriptExtractor;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    pub persona: String,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_transcript: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedScript {
    pub narration: String,
    #[serde(default)]
    pub visual_prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    /// Ratio string such as `"9:16"`.
    pub aspect_ratio: String,
}

/// Plaintext transcript plus whatever the extractor reports about its origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub provenance: serde_json::Value,
}

/// One still shown for a fixed time in the rendered video.
#[derive(Debug, Clone)]
pub struct RenderSlide {
    pub image: Vec<u8>,
    pub duration_secs: f64,
}

#[derive(Debug, Clone)]
pub struct RenderInput {
    pub slides: Vec<RenderSlide>,
    /// Compressed narration.
    pub audio: Vec<u8>,
    /// ASS caption document.
    pub captions: String,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read-only source of channel profiles.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn profile(&self, channel_id: &str) -> Result<Option<ChannelProfile>, CollaboratorError>;
}

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Persona + theme (+ reference transcript) to narration and visual prompts.
    async fn generate_script(
        &self,
        request: &ScriptRequest,
        api_key: &str,
    ) -> Result<GeneratedScript, CollaboratorError>;

    /// Narration to title, description, tags and thumbnail text.
    async fn generate_metadata(
        &self,
        narration: &str,
        api_key: &str,
    ) -> Result<VideoMetadata, CollaboratorError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns raw mono 16-bit little-endian PCM at `request.sample_rate`.
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        api_key: &str,
    ) -> Result<Vec<u8>, CollaboratorError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Zero or more encoded images for one prompt.
    async fn generate(
        &self,
        request: &ImageRequest,
        api_key: &str,
    ) -> Result<Vec<Vec<u8>>, CollaboratorError>;
}

#[async_trait]
pub trait TranscriptExtractor: Send + Sync {
    async fn extract(&self, source: &str, token: &str) -> Result<Transcript, CollaboratorError>;
}

/// Key-value storage for generated media, keyed `{project_id}/{name}`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), CollaboratorError>;

    /// Fails with [`CollaboratorError::NotFound`] for an unknown key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, CollaboratorError>;

    /// Remove every blob under `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CollaboratorError>;
}

/// Audio compression and final video assembly.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// WAV in, MP3 out.
    async fn compress_audio(&self, wav: Vec<u8>) -> Result<Vec<u8>, CollaboratorError>;

    /// Captioned slideshow, MP4 out.
    async fn render(&self, input: RenderInput) -> Result<Vec<u8>, CollaboratorError>;
}

/// The collaborator set handed to every stage.
#[derive(Clone)]
pub struct Collaborators {
    pub profiles: Arc<dyn ProfileProvider>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub images: Arc<dyn ImageGenerator>,
    pub transcripts: Arc<dyn TranscriptExtractor>,
    pub blobs: Arc<dyn BlobStore>,
    pub media: Arc<dyn MediaToolkit>,
}

impl Collaborators {
    /// Production wiring: the HTTP gateway for generation, local files for
    /// blobs and profiles, and ffmpeg for media.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, CollaboratorError> {
        let gateway = Arc::new(HttpGateway::new(config.gateway_url.clone()));
        let profiles = JsonFileProfileProvider::load(&config.profiles_path).await?;
        let blobs_dir = config.blobs_dir();
        tokio::fs::create_dir_all(&blobs_dir).await?;

        Ok(Self {
            profiles: Arc::new(profiles),
            scripts: gateway.clone(),
            speech: gateway.clone(),
            images: gateway.clone(),
            transcripts: Arc::new(PollingTranscriptExtractor::new(
                gateway,
                config.transcript_polling,
            )),
            blobs: Arc::new(LocalBlobStore::new(blobs_dir)),
            media: Arc::new(FfmpegToolkit::new(config.scratch_dir())),
        })
    }
}
