use async_trait::async_trait;
use shortreel_core::aligner::{total_duration, StoryboardSegment};
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{AudioCompressData, ImagesData, RenderData, SubtitlesData};

use super::{StageContext, StageHandler, StageOutput};
use crate::collaborators::{RenderInput, RenderSlide};
use crate::error::{AtStage, PipelineError};

/// Assembles stills, compressed narration and captions into the final video.
pub struct RenderHandler;

/// Pick the image shown for each segment.
///
/// A segment without images borrows the nearest earlier segment's image, or
/// the first later one when nothing precedes it. Returns `None` when no
/// segment has any image.
pub(crate) fn slide_images(segments: &[StoryboardSegment]) -> Option<Vec<&str>> {
    let first = segments
        .iter()
        .find_map(|s| s.image_keys.first())?
        .as_str();
    let mut current = first;
    Some(
        segments
            .iter()
            .map(|s| {
                if let Some(key) = s.image_keys.first() {
                    current = key.as_str();
                }
                current
            })
            .collect(),
    )
}

#[async_trait]
impl StageHandler for RenderHandler {
    fn stage(&self) -> Stage {
        Stage::Render
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let images: ImagesData = ctx.require(Stage::Render)?;
        let audio: AudioCompressData = ctx.require(Stage::Render)?;
        let subtitles: SubtitlesData = ctx.require(Stage::Render)?;

        let keys = slide_images(&images.segments).ok_or_else(|| PipelineError::Validation {
            stage: Stage::Render,
            message: "no images were generated for any segment".to_string(),
        })?;

        let blobs = &ctx.services.blobs;
        let mut slides = Vec::with_capacity(keys.len());
        for (segment, key) in images.segments.iter().zip(keys) {
            slides.push(RenderSlide {
                image: blobs.get(key).await.at_stage(Stage::Render)?,
                duration_secs: segment.duration,
            });
        }
        let audio_bytes = blobs.get(&audio.key).await.at_stage(Stage::Render)?;
        let captions = blobs
            .get(&subtitles.caption_key)
            .await
            .at_stage(Stage::Render)?;
        let captions = String::from_utf8(captions).map_err(|_| PipelineError::Validation {
            stage: Stage::Render,
            message: "caption document is not valid UTF-8".to_string(),
        })?;

        let (width, height) = ctx.profile.format.resolution();
        let video = ctx
            .services
            .media
            .render(RenderInput {
                slides,
                audio: audio_bytes,
                captions,
                width,
                height,
            })
            .await
            .at_stage(Stage::Render)?;

        let key = ctx.blob_key("video.mp4");
        blobs.put(&key, video).await.at_stage(Stage::Render)?;

        StageOutput::advance(&RenderData {
            key,
            duration_secs: total_duration(&images.segments),
        })
    }
}
