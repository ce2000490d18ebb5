//! Caption-track encoding (Advanced SubStation Alpha).
//!
//! Turns ordered, timed storyboard segments into a standalone `.ass`
//! document: a header carrying the canvas size and one named style, followed
//! by exactly one `Dialogue` event per segment. Events are contiguous, start
//! at zero and never overlap.

use crate::aligner::StoryboardSegment;
use crate::error::CoreError;
use crate::profile::{AspectRatio, CaptionPosition, SubtitleStyle};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Name of the single style every event references.
pub const STYLE_NAME: &str = "Default";

/// Font size before aspect and user scaling.
pub const BASE_FONT_SIZE: f64 = 60.0;

/// Aspect multiplier for vertical canvases (taller frames, larger type).
pub const VERTICAL_SIZE_SCALE: f64 = 1.2;

/// Aspect multiplier for horizontal canvases.
pub const HORIZONTAL_SIZE_SCALE: f64 = 0.8;

/// Outline thickness in pixels.
const OUTLINE_WIDTH: u32 = 3;

/// Vertical margin as a fraction of canvas height (top/bottom placement).
const MARGIN_V_FRACTION: f64 = 0.10;

/// Horizontal margins in pixels.
const MARGIN_H: u32 = 40;

const EVENTS_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

const STYLES_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Numeric ASS alignment code (numpad layout, horizontally centred).
pub fn alignment_code(position: CaptionPosition) -> u8 {
    match position {
        CaptionPosition::Bottom => 2,
        CaptionPosition::Center => 5,
        CaptionPosition::Top => 8,
    }
}

/// Font size for a canvas orientation and user percentage.
pub fn font_size(aspect: AspectRatio, size_percent: u32) -> u32 {
    let scale = match aspect {
        AspectRatio::Vertical => VERTICAL_SIZE_SCALE,
        AspectRatio::Horizontal => HORIZONTAL_SIZE_SCALE,
    };
    let size = (BASE_FONT_SIZE * scale * f64::from(size_percent) / 100.0).round();
    (size as u32).max(1)
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// Parse `#RRGGBB` (or bare `RRGGBB`, any case) into a packed `0xRRGGBB`.
pub fn parse_hex_rgb(hex: &str) -> Result<u32, CoreError> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(format!(
            "invalid color '{hex}', expected #RRGGBB"
        )));
    }
    u32::from_str_radix(digits, 16)
        .map_err(|e| CoreError::Validation(format!("invalid color '{hex}': {e}")))
}

/// Swap the red and blue channels of a packed 24-bit color.
///
/// The swap is its own inverse: `0xRRGGBB <-> 0xBBGGRR`.
pub fn swap_red_blue(color: u32) -> u32 {
    let r = (color >> 16) & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = color & 0xFF;
    (b << 16) | (g << 8) | r
}

/// Convert web hex into the track's native `&H00BBGGRR` form.
pub fn hex_to_ass_color(hex: &str) -> Result<String, CoreError> {
    let bgr = swap_red_blue(parse_hex_rgb(hex)?);
    Ok(format!("&H00{bgr:06X}"))
}

/// Convert a native `&H00BBGGRR` (or bare `BBGGRR`) color back to `#RRGGBB`.
pub fn ass_color_to_hex(ass: &str) -> Result<String, CoreError> {
    let trimmed = ass.trim().trim_start_matches("&H").trim_end_matches('&');
    let bgr_digits = match trimmed.len() {
        8 => trimmed.get(2..),
        6 => Some(trimmed),
        _ => None,
    }
    .ok_or_else(|| {
        CoreError::Validation(format!("invalid native color '{ass}', expected &H00BBGGRR"))
    })?;
    let rgb = swap_red_blue(parse_hex_rgb(bgr_digits)?);
    Ok(format!("#{rgb:06X}"))
}

// ---------------------------------------------------------------------------
// Track model
// ---------------------------------------------------------------------------

/// One timed caption line, in centiseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueEvent {
    pub start_cs: u64,
    pub end_cs: u64,
    pub text: String,
}

/// A complete caption document.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub font_name: String,
    pub font_size: u32,
    pub primary_color: String,
    pub outline_color: String,
    pub alignment: u8,
    pub margin_v: u32,
    pub events: Vec<DialogueEvent>,
}

impl CaptionTrack {
    /// Render the document as `.ass` text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str(&format!("PlayResX: {}\n", self.play_res_x));
        out.push_str(&format!("PlayResY: {}\n", self.play_res_y));
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(STYLES_FORMAT);
        out.push('\n');
        out.push_str(&format!(
            "Style: {STYLE_NAME},{font},{size},{primary},&H000000FF,{outline},&H00000000,1,0,0,0,100,100,0,0,1,{OUTLINE_WIDTH},0,{align},{MARGIN_H},{MARGIN_H},{margin_v},1\n\n",
            font = self.font_name,
            size = self.font_size,
            primary = self.primary_color,
            outline = self.outline_color,
            align = self.alignment,
            margin_v = self.margin_v,
        ));

        out.push_str("[Events]\n");
        out.push_str(EVENTS_FORMAT);
        out.push('\n');
        for event in &self.events {
            out.push_str(&format!(
                "Dialogue: 0,{},{},{STYLE_NAME},,0,0,0,,{}\n",
                format_timestamp(event.start_cs),
                format_timestamp(event.end_cs),
                event.text,
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Build a caption track with one event per segment, in input order.
///
/// Boundaries come from cumulative durations rounded to centiseconds, so
/// neighbouring events share an exact boundary. Every event spans at least
/// one centisecond and the last one ends on the rounded total.
pub fn encode_captions(
    segments: &[StoryboardSegment],
    style: &SubtitleStyle,
    aspect: AspectRatio,
) -> Result<CaptionTrack, CoreError> {
    if segments.is_empty() {
        return Err(CoreError::Validation(
            "cannot encode captions for an empty storyboard".to_string(),
        ));
    }
    if let Some(bad) = segments
        .iter()
        .find(|s| !s.duration.is_finite() || s.duration < 0.0)
    {
        return Err(CoreError::Validation(format!(
            "segment {} has invalid duration {}",
            bad.id, bad.duration
        )));
    }

    let (width, height) = aspect.resolution();
    let position = style.position;

    let boundaries = event_boundaries(segments);
    let events = segments
        .iter()
        .zip(boundaries.windows(2))
        .map(|(segment, range)| DialogueEvent {
            start_cs: range[0],
            end_cs: range[1],
            text: sanitize_text(&segment.script_text),
        })
        .collect();

    Ok(CaptionTrack {
        play_res_x: width,
        play_res_y: height,
        font_name: sanitize_field(&style.font_name),
        font_size: font_size(aspect, style.size_percent),
        primary_color: hex_to_ass_color(&style.primary_color)?,
        outline_color: hex_to_ass_color(&style.outline_color)?,
        alignment: alignment_code(position),
        margin_v: match position {
            CaptionPosition::Center => 0,
            _ => (f64::from(height) * MARGIN_V_FRACTION).round() as u32,
        },
        events,
    })
}

/// Centisecond boundaries `0 = b0 < b1 < ... < bn`, one more than there are
/// segments.
///
/// Cumulative durations are rounded, pushed forward so each event lasts at
/// least one centisecond, then capped from the end so the last event closes
/// on the rounded total. The total is only exceeded when it is shorter than
/// one centisecond per segment.
fn event_boundaries(segments: &[StoryboardSegment]) -> Vec<u64> {
    let mut boundaries = Vec::with_capacity(segments.len() + 1);
    boundaries.push(0u64);
    let mut cumulative = 0.0;
    for segment in segments {
        cumulative += segment.duration;
        let previous = boundaries[boundaries.len() - 1];
        boundaries.push(((cumulative * 100.0).round() as u64).max(previous + 1));
    }

    let last = boundaries.len() - 1;
    boundaries[last] = ((cumulative * 100.0).round() as u64).max(last as u64);
    for i in (1..last).rev() {
        boundaries[i] = boundaries[i].min(boundaries[i + 1] - 1);
    }
    boundaries
}

/// Flatten newlines and neutralise override braces.
///
/// `{` and `}` open and close override blocks in event text; they are
/// replaced with their full-width look-alikes.
pub fn sanitize_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            '{' => '\u{FF5B}',
            '}' => '\u{FF5D}',
            other => other,
        })
        .collect()
}

/// Style fields are comma-separated; a comma in a font name would shift columns.
fn sanitize_field(value: &str) -> String {
    sanitize_text(value).replace(',', " ")
}

/// Format centiseconds as `H:MM:SS.cc`.
pub fn format_timestamp(cs: u64) -> String {
    let hours = cs / 360_000;
    let minutes = (cs / 6_000) % 60;
    let seconds = (cs / 100) % 60;
    let centis = cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
