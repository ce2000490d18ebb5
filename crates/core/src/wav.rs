//! RIFF/WAVE framing for synthesized speech.
//!
//! Speech synthesizers return bare mono 16-bit little-endian PCM. Before the
//! audio can be stored or handed to ffmpeg it is prefixed with the canonical
//! 44-byte header.

use crate::error::CoreError;

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Default sample rate of synthesized speech.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;
const FORMAT_PCM: u16 = 1;

/// Fields read back from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length of the PCM payload in bytes.
    pub data_len: u32,
}

impl WavInfo {
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * u32::from(self.bits_per_sample) / 8
    }

    /// Playback duration of the payload in seconds.
    pub fn duration_secs(&self) -> f64 {
        match self.byte_rate() {
            0 => 0.0,
            rate => f64::from(self.data_len) / f64::from(rate),
        }
    }
}

/// Build the 44-byte header for `data_len` bytes of mono 16-bit PCM.
pub fn wav_header(sample_rate: u32, data_len: u32) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = sample_rate * u32::from(BLOCK_ALIGN);

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Prefix raw PCM with a WAV header.
pub fn wrap_pcm(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, CoreError> {
    if sample_rate == 0 {
        return Err(CoreError::Validation("sample rate must be > 0".to_string()));
    }
    if pcm.len() % usize::from(BLOCK_ALIGN) != 0 {
        return Err(CoreError::Validation(format!(
            "PCM payload of {} bytes is not a whole number of 16-bit samples",
            pcm.len()
        )));
    }
    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or_else(|| {
            CoreError::Validation(format!("PCM payload of {} bytes is too large", pcm.len()))
        })?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&wav_header(sample_rate, data_len));
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Duration of `byte_len` bytes of mono 16-bit PCM.
pub fn pcm_duration_secs(byte_len: usize, sample_rate: u32) -> f64 {
    let byte_rate = u64::from(sample_rate) * u64::from(BLOCK_ALIGN);
    if byte_rate == 0 {
        return 0.0;
    }
    byte_len as f64 / byte_rate as f64
}

/// Read the header fields of a canonical 44-byte-header WAV file.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavInfo, CoreError> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(CoreError::Validation(format!(
            "WAV data too short: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" || &bytes[36..40] != b"data" {
        return Err(CoreError::Validation(
            "not a canonical RIFF/WAVE file".to_string(),
        ));
    }

    let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let u32_at =
        |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

    Ok(WavInfo {
        sample_rate: u32_at(24),
        channels: u16_at(22),
        bits_per_sample: u16_at(34),
        data_len: u32_at(40),
    })
}
