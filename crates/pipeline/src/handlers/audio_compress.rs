use async_trait::async_trait;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{AudioCompressData, AudioData};

use super::{StageContext, StageHandler, StageOutput};
use crate::error::{AtStage, PipelineError};

/// Transcodes the narration WAV to MP3.
pub struct AudioCompressHandler;

#[async_trait]
impl StageHandler for AudioCompressHandler {
    fn stage(&self) -> Stage {
        Stage::AudioCompress
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let audio: AudioData = ctx.require(Stage::AudioCompress)?;
        let wav = ctx
            .services
            .blobs
            .get(&audio.key)
            .await
            .at_stage(Stage::AudioCompress)?;

        let mp3 = ctx
            .services
            .media
            .compress_audio(wav)
            .await
            .at_stage(Stage::AudioCompress)?;
        let byte_length = mp3.len() as u64;
        let key = ctx.blob_key("audio.mp3");
        ctx.services
            .blobs
            .put(&key, mp3)
            .await
            .at_stage(Stage::AudioCompress)?;

        StageOutput::advance(&AudioCompressData {
            key,
            source_key: audio.key,
            byte_length,
        })
    }
}
