//! [`MediaToolkit`] backed by the `ffmpeg` binary.
//!
//! Each call gets its own scratch directory, so concurrent projects never
//! share intermediate files. The directory is removed whether or not ffmpeg
//! succeeds.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shortreel_core::ffmpeg::{self, RenderPlan, Slide, DEFAULT_AUDIO_BITRATE, DEFAULT_FPS};
use uuid::Uuid;

use crate::collaborators::{MediaToolkit, RenderInput};
use crate::error::CollaboratorError;

pub struct FfmpegToolkit {
    scratch_root: PathBuf,
    audio_bitrate: String,
    fps: u32,
}

impl FfmpegToolkit {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            fps: DEFAULT_FPS,
        }
    }

    async fn scratch_dir(&self) -> Result<PathBuf, CollaboratorError> {
        let dir = self.scratch_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn cleanup(dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove scratch directory");
        }
    }

    async fn compress_in(&self, dir: &Path, wav: Vec<u8>) -> Result<Vec<u8>, CollaboratorError> {
        let input = dir.join("audio.wav");
        let output = dir.join("audio.mp3");
        tokio::fs::write(&input, wav).await?;
        ffmpeg::compress_audio(&input, &output, &self.audio_bitrate).await?;
        Ok(tokio::fs::read(&output).await?)
    }

    async fn render_in(&self, dir: &Path, input: RenderInput) -> Result<Vec<u8>, CollaboratorError> {
        let plan = stage_render_inputs(dir, input, self.fps).await?;
        ffmpeg::render_slideshow(&plan).await?;
        Ok(tokio::fs::read(&plan.output_path).await?)
    }
}

/// Write render inputs into `dir` and describe the ffmpeg invocation.
pub(crate) async fn stage_render_inputs(
    dir: &Path,
    input: RenderInput,
    fps: u32,
) -> Result<RenderPlan, CollaboratorError> {
    let mut slides = Vec::with_capacity(input.slides.len());
    for (i, slide) in input.slides.into_iter().enumerate() {
        let image_path = dir.join(format!("slide-{:03}.png", i + 1));
        tokio::fs::write(&image_path, slide.image).await?;
        slides.push(Slide {
            image_path,
            duration_secs: slide.duration_secs,
        });
    }

    let audio_path = dir.join("audio.mp3");
    tokio::fs::write(&audio_path, input.audio).await?;
    let captions_path = dir.join("captions.ass");
    tokio::fs::write(&captions_path, input.captions).await?;

    Ok(RenderPlan {
        slides,
        audio_path,
        captions_path,
        concat_list_path: dir.join("slides.ffconcat"),
        output_path: dir.join("video.mp4"),
        width: input.width,
        height: input.height,
        fps,
    })
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn compress_audio(&self, wav: Vec<u8>) -> Result<Vec<u8>, CollaboratorError> {
        let dir = self.scratch_dir().await?;
        let result = self.compress_in(&dir, wav).await;
        Self::cleanup(&dir).await;
        result
    }

    async fn render(&self, input: RenderInput) -> Result<Vec<u8>, CollaboratorError> {
        let dir = self.scratch_dir().await?;
        let result = self.render_in(&dir, input).await;
        Self::cleanup(&dir).await;
        result
    }
}
