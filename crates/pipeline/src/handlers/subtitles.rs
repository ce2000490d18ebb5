use async_trait::async_trait;
use shortreel_core::aligner::{align_to_audio, build_segments, total_duration};
use shortreel_core::captions::encode_captions;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{AudioData, ScriptData, SubtitlesData};

use super::{StageContext, StageHandler, StageOutput};
use crate::error::{AtStage, PipelineError};

/// Builds the storyboard, aligns it to the narration and writes captions.
pub struct SubtitlesHandler;

#[async_trait]
impl StageHandler for SubtitlesHandler {
    fn stage(&self) -> Stage {
        Stage::Subtitles
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let script: ScriptData = ctx.require(Stage::Subtitles)?;
        let audio: AudioData = ctx.require(Stage::Subtitles)?;

        let mut segments = build_segments(&script.chunks, &script.visual_prompts);
        align_to_audio(&mut segments, audio.duration_secs).at_stage(Stage::Subtitles)?;
        let track = encode_captions(&segments, &ctx.profile.subtitle_style, ctx.profile.format)
            .at_stage(Stage::Subtitles)?;

        let caption_key = ctx.blob_key("captions.ass");
        ctx.services
            .blobs
            .put(&caption_key, track.render().into_bytes())
            .await
            .at_stage(Stage::Subtitles)?;

        StageOutput::advance(&SubtitlesData {
            total_duration_secs: total_duration(&segments),
            event_count: track.events.len(),
            segments,
            caption_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shortreel_core::chunker::chunk_script;
    use shortreel_core::stage_data::VideoMetadata;
    use shortreel_db::{CreateProject, Project};

    use super::*;
    use crate::collaborators::BlobStore;
    use crate::handlers::test_support::{config, profile, services};

    #[tokio::test]
    async fn aligns_segments_and_stores_captions() {
        let config = config();
        let narration = "Stars are born in clouds of gas and dust that collapse. \
                         They burn hydrogen for billions of years in their cores. \
                         Eventually the fuel runs out and they fade or explode.";
        let chunks = chunk_script(narration, &config.chunking).unwrap();
        let mut project = Project::new(
            CreateProject {
                channel_id: "space".to_string(),
                theme: "stars".to_string(),
                reference_source: None,
            },
            Utc::now(),
        );
        project
            .stage_data
            .insert(&ScriptData {
                narration: narration.to_string(),
                chunks: chunks.clone(),
                visual_prompts: vec!["a cloud".to_string()],
                metadata: VideoMetadata::default(),
            })
            .unwrap();
        project
            .stage_data
            .insert(&AudioData {
                key: "k".to_string(),
                sample_rate: 24_000,
                byte_length: 0,
                duration_secs: 12.5,
            })
            .unwrap();
        let (services, _, blobs) = services();
        let profile = profile();
        let ctx = StageContext {
            project: &project,
            profile: &profile,
            config: &config,
            services: &services,
        };

        let output = SubtitlesHandler.execute(&ctx).await.unwrap();
        let data: SubtitlesData = serde_json::from_value(output.data).unwrap();

        assert_eq!(data.segments.len(), chunks.len());
        assert_eq!(data.event_count, chunks.len());
        assert!((data.total_duration_secs - 12.5).abs() < 1e-6);
        assert!(data.segments.iter().all(|s| s.visual_prompt == "a cloud"));

        let captions = String::from_utf8(blobs.get(&data.caption_key).await.unwrap()).unwrap();
        assert!(captions.contains("[Events]"));
    }
}
