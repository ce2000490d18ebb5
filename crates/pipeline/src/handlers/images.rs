use async_trait::async_trait;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{ImagesData, SubtitlesData};

use super::{StageContext, StageHandler, StageOutput};
use crate::collaborators::ImageRequest;
use crate::config::Credential;
use crate::error::{AtStage, PipelineError};

/// Generates the stills for every storyboard segment.
pub struct ImagesHandler;

/// Append the channel's visual style to a segment prompt.
pub(crate) fn expand_prompt(prompt: &str, visual_style: &str) -> String {
    let style = visual_style.trim();
    if style.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}, {style}")
    }
}

#[async_trait]
impl StageHandler for ImagesHandler {
    fn stage(&self) -> Stage {
        Stage::Images
    }

    fn required_credentials(&self) -> &'static [Credential] {
        &[Credential::ImageApiKey]
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let api_key = ctx.credential(Credential::ImageApiKey)?;
        let subtitles: SubtitlesData = ctx.require(Stage::Images)?;
        let aspect_ratio = ctx.profile.format.ratio().to_string();

        let mut segments = subtitles.segments;
        for (n, segment) in segments.iter_mut().enumerate() {
            let request = ImageRequest {
                prompt: expand_prompt(&segment.visual_prompt, &ctx.profile.visual_style),
                aspect_ratio: aspect_ratio.clone(),
            };
            let images = ctx
                .services
                .images
                .generate(&request, api_key)
                .await
                .at_stage(Stage::Images)?;

            segment.image_keys.clear();
            for (k, image) in images.into_iter().enumerate() {
                let key = ctx.blob_key(&format!("image-{}-{}.png", n + 1, k + 1));
                ctx.services
                    .blobs
                    .put(&key, image)
                    .await
                    .at_stage(Stage::Images)?;
                segment.image_keys.push(key);
            }
            if segment.image_keys.is_empty() {
                tracing::warn!(
                    project_id = %ctx.project.id,
                    segment = %segment.id,
                    "Image generator returned no images"
                );
            }
        }

        StageOutput::advance(&ImagesData { segments })
    }
}
