//! Channel profile: the read-only persona and presentation settings that a
//! channel applies to every project it runs.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Target frame orientation of the rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    /// 9:16, 1080x1920.
    Vertical,
    /// 16:9, 1920x1080.
    Horizontal,
}

impl AspectRatio {
    /// Canvas size in pixels as `(width, height)`.
    pub fn resolution(self) -> (u32, u32) {
        match self {
            Self::Vertical => (1080, 1920),
            Self::Horizontal => (1920, 1080),
        }
    }

    /// Ratio string understood by image generators, e.g. `"9:16"`.
    pub fn ratio(self) -> &'static str {
        match self {
            Self::Vertical => "9:16",
            Self::Horizontal => "16:9",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "vertical" | "9:16" => Ok(Self::Vertical),
            "horizontal" | "16:9" => Ok(Self::Horizontal),
            other => Err(CoreError::Validation(format!(
                "Unknown aspect ratio '{other}'. Must be one of: vertical, horizontal"
            ))),
        }
    }
}

/// Vertical placement of captions on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Center,
    Top,
}

/// Subtitle appearance chosen by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleStyle {
    pub font_name: String,
    /// User scaling factor applied to the base font size (100 = unchanged).
    pub size_percent: u32,
    /// Web hex, `#RRGGBB`.
    pub primary_color: String,
    /// Web hex, `#RRGGBB`.
    pub outline_color: String,
    #[serde(default)]
    pub position: CaptionPosition,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            size_percent: 100,
            primary_color: "#FFFFFF".to_string(),
            outline_color: "#000000".to_string(),
            position: CaptionPosition::Bottom,
        }
    }
}

/// Persona and presentation settings for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub channel_id: String,
    /// Narrator persona handed to the script generator.
    pub persona: String,
    /// Style phrase appended to every visual prompt.
    pub visual_style: String,
    pub voice_id: String,
    #[serde(default)]
    pub subtitle_style: SubtitleStyle,
    pub format: AspectRatio,
}
