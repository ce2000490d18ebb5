//! Shared harness for engine integration tests: in-memory stores and
//! collaborator fakes that record every call.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shortreel_core::profile::{AspectRatio, ChannelProfile, SubtitleStyle};
use shortreel_core::stage_data::VideoMetadata;
use shortreel_db::{CreateProject, MemoryProjectStore};
use shortreel_events::EventBus;
use shortreel_pipeline::blob::MemoryBlobStore;
use shortreel_pipeline::collaborators::*;
use shortreel_pipeline::profiles::JsonFileProfileProvider;
use shortreel_pipeline::{
    CollaboratorError, Collaborators, Credential, Credentials, EngineConfig, HandlerRegistry,
    PipelineEngine,
};
use tokio::sync::Notify;

pub const CHANNEL: &str = "space";

pub fn profile() -> ChannelProfile {
    ChannelProfile {
        channel_id: CHANNEL.to_string(),
        persona: "An astronomer".to_string(),
        visual_style: "cinematic".to_string(),
        voice_id: "v1".to_string(),
        subtitle_style: SubtitleStyle::default(),
        format: AspectRatio::Vertical,
    }
}

pub fn full_config() -> EngineConfig {
    EngineConfig {
        credentials: Credentials::new()
            .with(Credential::TextApiKey, "text")
            .with(Credential::SpeechApiKey, "speech")
            .with(Credential::ImageApiKey, "image")
            .with(Credential::TranscriptToken, "token"),
        ..EngineConfig::default()
    }
}

pub fn new_project(reference_source: Option<&str>) -> CreateProject {
    CreateProject {
        channel_id: CHANNEL.to_string(),
        theme: "The life of a star".to_string(),
        reference_source: reference_source.map(str::to_string),
    }
}

/// Collaborator fakes with switchable failures.
#[derive(Default)]
pub struct Fakes {
    calls: Mutex<Vec<String>>,
    speech_error: Mutex<Option<String>>,
    gate_speech: AtomicBool,
    pub speech_started: Notify,
    pub speech_release: Notify,
}

impl Fakes {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    /// Make speech synthesis fail with `body` until cleared.
    pub fn fail_speech(&self, body: Option<String>) {
        *self.speech_error.lock().unwrap() = body;
    }

    /// Hold speech synthesis until `speech_release` is notified.
    pub fn gate_speech(&self) {
        self.gate_speech.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScriptGenerator for Fakes {
    async fn generate_script(
        &self,
        _request: &ScriptRequest,
        _api_key: &str,
    ) -> Result<GeneratedScript, CollaboratorError> {
        self.record("script");
        Ok(GeneratedScript {
            narration: "Stars are born in vast clouds of gas. They shine for billions of years. \
                        In the end they fade away or explode."
                .to_string(),
            visual_prompts: vec!["a glowing nebula".to_string(), "a supernova".to_string()],
        })
    }

    async fn generate_metadata(
        &self,
        _narration: &str,
        _api_key: &str,
    ) -> Result<VideoMetadata, CollaboratorError> {
        self.record("metadata");
        Ok(VideoMetadata {
            title: "Life of a star".to_string(),
            description: "From nebula to supernova".to_string(),
            tags: vec!["space".to_string()],
            thumbnail_text: "STARS".to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for Fakes {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        _api_key: &str,
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.record("speech");
        if self.gate_speech.load(Ordering::SeqCst) {
            self.speech_started.notify_one();
            self.speech_release.notified().await;
        }
        if let Some(body) = self.speech_error.lock().unwrap().clone() {
            return Err(CollaboratorError::Api { status: 503, body });
        }
        // Three seconds of silence.
        Ok(vec![0; request.sample_rate as usize * 2 * 3])
    }
}

#[async_trait]
impl ImageGenerator for Fakes {
    async fn generate(
        &self,
        request: &ImageRequest,
        _api_key: &str,
    ) -> Result<Vec<Vec<u8>>, CollaboratorError> {
        self.record("image");
        Ok(vec![request.prompt.clone().into_bytes()])
    }
}

#[async_trait]
impl TranscriptExtractor for Fakes {
    async fn extract(&self, source: &str, _token: &str) -> Result<Transcript, CollaboratorError> {
        self.record("transcript");
        Ok(Transcript {
            text: format!("What we learned from {source}."),
            provenance: serde_json::json!({ "source": source }),
        })
    }
}

#[async_trait]
impl MediaToolkit for Fakes {
    async fn compress_audio(&self, wav: Vec<u8>) -> Result<Vec<u8>, CollaboratorError> {
        self.record("compress");
        Ok(wav.into_iter().step_by(4).collect())
    }

    async fn render(&self, _input: RenderInput) -> Result<Vec<u8>, CollaboratorError> {
        self.record("render");
        Ok(b"video".to_vec())
    }
}

pub struct Harness {
    pub engine: Arc<PipelineEngine>,
    pub store: Arc<MemoryProjectStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub fakes: Arc<Fakes>,
    pub events: Arc<EventBus>,
}

pub fn harness(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryProjectStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let fakes = Arc::new(Fakes::default());
    let events = Arc::new(EventBus::default());
    let services = Collaborators {
        profiles: Arc::new(JsonFileProfileProvider::from_profiles([profile()])),
        scripts: fakes.clone(),
        speech: fakes.clone(),
        images: fakes.clone(),
        transcripts: fakes.clone(),
        blobs: blobs.clone(),
        media: fakes.clone(),
    };
    let engine = PipelineEngine::new(
        store.clone(),
        HandlerRegistry::standard(),
        services,
        Arc::new(config),
        events.clone(),
    );
    Harness {
        engine: Arc::new(engine),
        store,
        blobs,
        fakes,
        events,
    }
}
