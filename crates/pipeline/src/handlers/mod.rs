//! Stage handlers and the registry that maps each stage to its handler.
//!
//! A handler is stateless across projects. It reads whatever earlier stages
//! left in `stageData`, calls collaborators, and returns exactly one payload
//! for its own stage. Re-running a handler re-derives everything from the
//! persisted data, so retries after an error start from scratch.

mod audio;
mod audio_compress;
mod images;
mod reference;
mod render;
mod script;
mod subtitles;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shortreel_core::profile::ChannelProfile;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::StagePayload;
use shortreel_db::Project;

use crate::collaborators::Collaborators;
use crate::config::{Credential, EngineConfig};
use crate::error::{AtStage, PipelineError};

pub use audio::AudioHandler;
pub use audio_compress::AudioCompressHandler;
pub use images::ImagesHandler;
pub use reference::ReferenceHandler;
pub use render::RenderHandler;
pub use script::ScriptHandler;
pub use subtitles::SubtitlesHandler;

/// Everything a handler may read while executing one stage.
pub struct StageContext<'a> {
    pub project: &'a Project,
    pub profile: &'a ChannelProfile,
    pub config: &'a EngineConfig,
    pub services: &'a Collaborators,
}

impl<'a> StageContext<'a> {
    pub fn credential(&self, credential: Credential) -> Result<&'a str, PipelineError> {
        self.config.credentials.require(credential)
    }

    /// Blob key for a file belonging to this project.
    pub fn blob_key(&self, name: &str) -> String {
        format!("{}/{name}", self.project.id)
    }

    /// Decode an earlier stage's payload, failing if it was never produced.
    pub fn require<T: StagePayload>(&self, stage: Stage) -> Result<T, PipelineError> {
        self.project.stage_data.require::<T>().at_stage(stage)
    }
}

/// Result of a successful stage execution.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Stage the payload belongs to.
    pub stage: Stage,
    pub data: serde_json::Value,
    /// New project title, if the stage produced one.
    pub title: Option<String>,
    /// Stop at REVIEW instead of advancing.
    pub review: bool,
}

impl StageOutput {
    /// Output that advances the project to the next stage.
    pub fn advance<T: StagePayload>(payload: &T) -> Result<Self, PipelineError> {
        let data = serde_json::to_value(payload).map_err(|e| PipelineError::Validation {
            stage: T::STAGE,
            message: format!("failed to encode output: {e}"),
        })?;
        Ok(Self {
            stage: T::STAGE,
            data,
            title: None,
            review: false,
        })
    }

    /// Output that waits for approval before the project advances.
    pub fn review<T: StagePayload>(payload: &T) -> Result<Self, PipelineError> {
        Ok(Self {
            review: true,
            ..Self::advance(payload)?
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;

    /// Credentials checked before `execute` runs.
    fn required_credentials(&self) -> &'static [Credential] {
        &[]
    }

    /// `false` when an optional stage's precondition is absent and the stage
    /// should be skipped.
    fn is_applicable(&self, _project: &Project) -> bool {
        true
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError>;
}

/// Maps each runnable stage to its handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production handler set, one per stage before DONE.
    pub fn standard() -> Self {
        Self::new()
            .with(ReferenceHandler)
            .with(ScriptHandler)
            .with(AudioHandler)
            .with(AudioCompressHandler)
            .with(SubtitlesHandler)
            .with(ImagesHandler)
            .with(RenderHandler)
    }

    /// Register `handler`, replacing any handler for the same stage.
    pub fn with(mut self, handler: impl StageHandler + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    pub fn register(&mut self, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(handler.stage(), handler);
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Collaborator fakes shared by the handler unit tests.

    use std::sync::Mutex;

    use shortreel_core::profile::{AspectRatio, SubtitleStyle};
    use shortreel_core::stage_data::VideoMetadata;

    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::collaborators::*;
    use crate::config::Credentials;
    use crate::error::CollaboratorError;
    use crate::profiles::JsonFileProfileProvider;

    pub fn profile() -> ChannelProfile {
        ChannelProfile {
            channel_id: "space".to_string(),
            persona: "An astronomer".to_string(),
            visual_style: "cinematic".to_string(),
            voice_id: "v1".to_string(),
            subtitle_style: SubtitleStyle::default(),
            format: AspectRatio::Vertical,
        }
    }

    pub fn config() -> EngineConfig {
        EngineConfig {
            credentials: Credentials::new()
                .with(Credential::TextApiKey, "text")
                .with(Credential::SpeechApiKey, "speech")
                .with(Credential::ImageApiKey, "image")
                .with(Credential::TranscriptToken, "token"),
            ..EngineConfig::default()
        }
    }

    #[derive(Default)]
    pub struct Fake {
        pub calls: Mutex<Vec<String>>,
    }

    impl Fake {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptGenerator for Fake {
        async fn generate_script(
            &self,
            request: &ScriptRequest,
            _api_key: &str,
        ) -> Result<GeneratedScript, CollaboratorError> {
            self.record(format!(
                "script:{}",
                request.reference_transcript.as_deref().unwrap_or("-")
            ));
            Ok(GeneratedScript {
                narration: "Stars are born in clouds. They burn for ages. Then they fade."
                    .to_string(),
                visual_prompts: vec!["a cloud".to_string(), "a star".to_string()],
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
                ..VideoMetadata::default()
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for Fake {
        async fn synthesize(
            &self,
            request: &SpeechRequest,
            _api_key: &str,
        ) -> Result<Vec<u8>, CollaboratorError> {
            self.record("speech");
            // Two seconds of silence.
            Ok(vec![0; request.sample_rate as usize * 4])
        }
    }

    #[async_trait]
    impl ImageGenerator for Fake {
        async fn generate(
            &self,
            request: &ImageRequest,
            _api_key: &str,
        ) -> Result<Vec<Vec<u8>>, CollaboratorError> {
            self.record(format!("image:{}", request.prompt));
            Ok(vec![request.prompt.as_bytes().to_vec()])
        }
    }

    #[async_trait]
    impl TranscriptExtractor for Fake {
        async fn extract(&self, source: &str, _token: &str) -> Result<Transcript, CollaboratorError> {
            self.record(format!("transcript:{source}"));
            Ok(Transcript {
                text: format!("transcript of {source}"),
                provenance: serde_json::Value::Null,
            })
        }
    }

    #[async_trait]
    impl MediaToolkit for Fake {
        async fn compress_audio(&self, wav: Vec<u8>) -> Result<Vec<u8>, CollaboratorError> {
            self.record("compress");
            Ok(wav[..wav.len() / 2].to_vec())
        }

        async fn render(&self, input: RenderInput) -> Result<Vec<u8>, CollaboratorError> {
            self.record(format!("render:{}", input.slides.len()));
            Ok(b"mp4".to_vec())
        }
    }

    pub fn services() -> (Collaborators, Arc<Fake>, Arc<MemoryBlobStore>) {
        let fake = Arc::new(Fake::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let services = Collaborators {
            profiles: Arc::new(JsonFileProfileProvider::from_profiles([profile()])),
            scripts: fake.clone(),
            speech: fake.clone(),
            images: fake.clone(),
            transcripts: fake.clone(),
            blobs: blobs.clone(),
            media: fake.clone(),
        };
        (services, fake, blobs)
    }
}
