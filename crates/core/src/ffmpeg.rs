//! FFmpeg command utilities.
//!
//! Shared by the audio-compress and render stages. Argument construction is
//! kept in pure functions so it can be tested without the binaries installed.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),

    #[error("invalid render plan: {0}")]
    InvalidPlan(String),
}

/// Availability report for the `ffmpeg` binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FfmpegInfo {
    pub installed: bool,
    /// First line of `ffmpeg -version`, empty when not installed.
    pub version: String,
    /// Resolved binary location, empty when unknown.
    pub path: String,
}

/// Default MP3 bitrate for compressed narration.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Output frame rate of rendered videos.
pub const DEFAULT_FPS: u32 = 30;

// ---------------------------------------------------------------------------
// Render plan
// ---------------------------------------------------------------------------

/// One still image shown for a fixed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub image_path: PathBuf,
    pub duration_secs: f64,
}

/// Everything needed to render the final slideshow video.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub slides: Vec<Slide>,
    pub audio_path: PathBuf,
    pub captions_path: PathBuf,
    /// Concat-demuxer list written next to the output.
    pub concat_list_path: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Report whether `ffmpeg` is on the PATH, with its version line and location.
pub async fn check_ffmpeg() -> FfmpegInfo {
    let output = match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output,
        Err(_) => {
            return FfmpegInfo {
                installed: false,
                version: String::new(),
                path: String::new(),
            }
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.lines().next().unwrap_or("unknown").to_string();

    let locator = if cfg!(windows) { "where" } else { "which" };
    let path = tokio::process::Command::new(locator)
        .arg("ffmpeg")
        .output()
        .await
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    FfmpegInfo {
        installed: output.status.success(),
        version,
        path,
    }
}

/// Run `ffmpeg` with the given arguments, failing on a non-zero exit.
pub async fn run_ffmpeg(args: &[String]) -> Result<(), FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

/// Transcode a WAV file to MP3.
pub async fn compress_audio(input: &Path, output: &Path, bitrate: &str) -> Result<(), FfmpegError> {
    if !input.exists() {
        return Err(FfmpegError::MediaNotFound(
            input.to_string_lossy().to_string(),
        ));
    }
    run_ffmpeg(&compress_audio_args(input, output, bitrate)).await
}

/// Render a captioned slideshow from a [`RenderPlan`].
pub async fn render_slideshow(plan: &RenderPlan) -> Result<(), FfmpegError> {
    let list = concat_list(&plan.slides)?;
    for path in [&plan.audio_path, &plan.captions_path] {
        if !path.exists() {
            return Err(FfmpegError::MediaNotFound(
                path.to_string_lossy().to_string(),
            ));
        }
    }

    tokio::fs::write(&plan.concat_list_path, list).await?;
    run_ffmpeg(&render_args(plan)).await
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

pub fn compress_audio_args(input: &Path, output: &Path, bitrate: &str) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-codec:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        bitrate.to_string(),
        output.to_string_lossy().to_string(),
    ]
}

pub fn render_args(plan: &RenderPlan) -> Vec<String> {
    let (w, h) = (plan.width, plan.height);
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,\
         subtitles='{}'",
        escape_filter_path(&plan.captions_path)
    );

    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        plan.concat_list_path.to_string_lossy().to_string(),
        "-i".to_string(),
        plan.audio_path.to_string_lossy().to_string(),
        "-vf".to_string(),
        filter,
        "-r".to_string(),
        plan.fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
        plan.output_path.to_string_lossy().to_string(),
    ]
}

/// Build a concat-demuxer list giving each slide its display duration.
///
/// The last file is repeated without a duration, which the demuxer needs to
/// honour the final slide's duration.
pub fn concat_list(slides: &[Slide]) -> Result<String, FfmpegError> {
    let Some(last) = slides.last() else {
        return Err(FfmpegError::InvalidPlan("no slides to render".to_string()));
    };

    let mut list = String::from("ffconcat version 1.0\n");
    for slide in slides {
        if !slide.duration_secs.is_finite() || slide.duration_secs < 0.0 {
            return Err(FfmpegError::InvalidPlan(format!(
                "slide {} has invalid duration {}",
                slide.image_path.display(),
                slide.duration_secs
            )));
        }
        list.push_str(&format!("file '{}'\n", quote_concat_path(&slide.image_path)));
        list.push_str(&format!("duration {:.3}\n", slide.duration_secs));
    }
    list.push_str(&format!("file '{}'\n", quote_concat_path(&last.image_path)));
    Ok(list)
}

fn quote_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Escape a path for use inside a single-quoted filtergraph argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', r"\\")
        .replace(':', r"\:")
        .replace('\'', r"\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(slides: Vec<Slide>) -> RenderPlan {
        RenderPlan {
            slides,
            audio_path: PathBuf::from("/tmp/p/audio.mp3"),
            captions_path: PathBuf::from("/tmp/p/captions.ass"),
            concat_list_path: PathBuf::from("/tmp/p/slides.ffconcat"),
            output_path: PathBuf::from("/tmp/p/video.mp4"),
            width: 1080,
            height: 1920,
            fps: DEFAULT_FPS,
        }
    }

    #[test]
    fn compress_args_use_mp3_encoder() {
        let args = compress_audio_args(Path::new("a.wav"), Path::new("a.mp3"), "96k");
        assert_eq!(
            args,
            ["-y", "-i", "a.wav", "-codec:a", "libmp3lame", "-b:a", "96k", "a.mp3"]
        );
    }

    #[test]
    fn concat_list_repeats_last_file() {
        let list = concat_list(&[
            Slide {
                image_path: PathBuf::from("/x/one.png"),
                duration_secs: 7.5,
            },
            Slide {
                image_path: PathBuf::from("/x/two.png"),
                duration_secs: 22.5,
            },
        ])
        .unwrap();

        assert_eq!(
            list,
            "ffconcat version 1.0\n\
             file '/x/one.png'\nduration 7.500\n\
             file '/x/two.png'\nduration 22.500\n\
             file '/x/two.png'\n"
        );
    }

    #[test]
    fn concat_list_rejects_empty_and_bad_durations() {
        assert!(concat_list(&[]).is_err());
        assert!(concat_list(&[Slide {
            image_path: PathBuf::from("a.png"),
            duration_secs: f64::NAN,
        }])
        .is_err());
    }

    #[test]
    fn concat_paths_escape_single_quotes() {
        let list = concat_list(&[Slide {
            image_path: PathBuf::from("/x/it's.png"),
            duration_secs: 1.0,
        }])
        .unwrap();
        assert!(list.contains(r"file '/x/it'\''s.png'"));
    }

    #[test]
    fn render_args_burn_captions_and_map_audio() {
        let args = render_args(&plan(vec![]));
        let vf = args
            .iter()
            .position(|a| a == "-vf")
            .map(|i| args[i + 1].clone())
            .unwrap();

        assert!(vf.starts_with("scale=1080:1920:force_original_aspect_ratio=decrease"));
        assert!(vf.ends_with("subtitles='/tmp/p/captions.ass'"));
        assert!(args.contains(&"/tmp/p/audio.mp3".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/p/video.mp4");
    }

    #[test]
    fn filter_path_escapes_colons() {
        assert_eq!(
            escape_filter_path(Path::new(r"C:\media\c.ass")),
            r"C\:\\media\\c.ass"
        );
    }
}
