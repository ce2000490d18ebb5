use async_trait::async_trait;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{AudioData, ScriptData};
use shortreel_core::wav::{pcm_duration_secs, wrap_pcm};

use super::{StageContext, StageHandler, StageOutput};
use crate::collaborators::SpeechRequest;
use crate::config::Credential;
use crate::error::{AtStage, PipelineError};

/// Synthesizes the narration and stores it as a WAV file.
pub struct AudioHandler;

#[async_trait]
impl StageHandler for AudioHandler {
    fn stage(&self) -> Stage {
        Stage::Audio
    }

    fn required_credentials(&self) -> &'static [Credential] {
        &[Credential::SpeechApiKey]
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let api_key = ctx.credential(Credential::SpeechApiKey)?;
        let script: ScriptData = ctx.require(Stage::Audio)?;
        let sample_rate = ctx.config.speech_sample_rate;

        let request = SpeechRequest {
            text: script.narration,
            voice_id: ctx.profile.voice_id.clone(),
            sample_rate,
        };
        let pcm = ctx
            .services
            .speech
            .synthesize(&request, api_key)
            .await
            .at_stage(Stage::Audio)?;
        if pcm.is_empty() {
            return Err(PipelineError::Validation {
                stage: Stage::Audio,
                message: "speech synthesizer returned no audio".to_string(),
            });
        }

        let duration_secs = pcm_duration_secs(pcm.len(), sample_rate);
        let wav = wrap_pcm(&pcm, sample_rate).at_stage(Stage::Audio)?;
        let byte_length = wav.len() as u64;
        let key = ctx.blob_key("audio.wav");
        ctx.services
            .blobs
            .put(&key, wav)
            .await
            .at_stage(Stage::Audio)?;

        StageOutput::advance(&AudioData {
            key,
            sample_rate,
            byte_length,
            duration_secs,
        })
    }
}
