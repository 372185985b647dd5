//! Input format description and interleaved PCM decoding

use serde::{Deserialize, Serialize};
use std::fmt;

/// PCM sample encodings a host may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    Pcm8,
    Pcm16,
    Pcm24,
    Pcm32,
    Float,
}

impl SampleEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::Pcm8 => 1,
            SampleEncoding::Pcm16 => 2,
            SampleEncoding::Pcm24 => 3,
            SampleEncoding::Pcm32 | SampleEncoding::Float => 4,
        }
    }

    /// Only 16-bit signed and 32-bit float are analysed.
    pub fn is_supported(self) -> bool {
        matches!(self, SampleEncoding::Pcm16 | SampleEncoding::Float)
    }
}

/// Interleaved little-endian audio format offered by the host graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn new(encoding: SampleEncoding, channels: u16, sample_rate: u32) -> Self {
        Self {
            encoding,
            channels,
            sample_rate,
        }
    }

    /// Bytes in one interleaved frame (one sample per channel)
    pub fn frame_size(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    pub(crate) fn is_usable(&self) -> bool {
        self.encoding.is_supported() && self.channels > 0 && self.sample_rate > 0
    }

    /// Downmix every complete frame in `bytes` to mono and hand it to `sink`
    /// in stream order. A trailing partial frame is ignored.
    pub(crate) fn for_each_mono(&self, bytes: &[u8], mut sink: impl FnMut(f32)) {
        let frame_size = self.frame_size();
        if frame_size == 0 {
            return;
        }

        let width = self.encoding.bytes_per_sample();
        let channels = self.channels as f32;

        for frame in bytes.chunks_exact(frame_size) {
            let sum: f32 = frame
                .chunks_exact(width)
                .map(|raw| decode_sample(self.encoding, raw))
                .sum();
            sink(sum / channels);
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} ch @ {} Hz",
            self.encoding, self.channels, self.sample_rate
        )
    }
}

fn decode_sample(encoding: SampleEncoding, raw: &[u8]) -> f32 {
    match (encoding, raw) {
        (SampleEncoding::Pcm16, &[lo, hi]) => i16::from_le_bytes([lo, hi]) as f32 / 32768.0,
        (SampleEncoding::Float, &[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]),
        _ => 0.0,
    }
}

/// Outcome of offering a format to the tap.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// The tap will handle this format; output format equals input format.
    Accepted(AudioFormat),

    /// The tap cannot analyse this format; the host should bypass it.
    Unsupported,
}

impl Negotiation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Negotiation::Accepted(_))
    }
}
