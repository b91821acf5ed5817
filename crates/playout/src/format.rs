//! Sample formats and the fixed unit conversions derived from them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Packed, interleaved, native-endian sample formats the pipeline can carry.
///
/// Silence is all-zero bytes in every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    I32,
    F32,
}

impl SampleFormat {
    /// Bytes per single-channel sample.
    pub fn width(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }

    pub fn to_cpal(self) -> cpal::SampleFormat {
        match self {
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::I32 => cpal::SampleFormat::I32,
            SampleFormat::F32 => cpal::SampleFormat::F32,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::I16 => "i16",
            SampleFormat::I32 => "i32",
            SampleFormat::F32 => "f32",
        };
        f.write_str(name)
    }
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "i16" | "s16" => Ok(SampleFormat::I16),
            "i32" | "s32" => Ok(SampleFormat::I32),
            "f32" | "float" => Ok(SampleFormat::F32),
            other => Err(format!("unsupported sample format: {other}")),
        }
    }
}

/// Shape of a decoded stream: rate, channel count and sample format.
///
/// A "sample" in the count conversions is one sample-frame, i.e. one value
/// per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl StreamSpec {
    pub fn new(rate: u32, channels: u16, format: SampleFormat) -> Self {
        Self {
            rate,
            channels,
            format,
        }
    }

    /// Bytes occupied by one sample-frame.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.channels.max(1)) * self.format.width()
    }

    pub fn byte_count_for_sample_count(&self, samples: usize) -> usize {
        samples.saturating_mul(self.bytes_per_sample())
    }

    /// Whole samples contained in `bytes`; a trailing partial sample is ignored.
    pub fn sample_count_for_byte_count(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_sample()
    }

    /// Sample index at `position`, rounded down.
    pub fn sample_count_for_position(&self, position: Duration) -> u64 {
        let samples = position.as_micros() * u128::from(self.rate) / MICROS_PER_SECOND;
        u64::try_from(samples).unwrap_or(u64::MAX)
    }

    /// Playback time of sample index `samples`, at microsecond precision.
    pub fn position_for_sample_count(&self, samples: u64) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        let micros = u128::from(samples) * MICROS_PER_SECOND / u128::from(self.rate);
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}
