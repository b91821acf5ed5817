//! Decode engine interface and its Symphonia implementation.
//!
//! The pipeline only sees the [`Decoder`] trait: it pulls whole frames of
//! interleaved sample bytes, repositions the stream, and converts between
//! samples, bytes and time. [`SymphoniaDecoder`] implements it for local
//! files:
//! - probe the container/codec from the file extension hint
//! - decode packets of the default track into the requested sample format
//! - trim the pre-roll left by packet-granular seeks

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::format::{SampleFormat, StreamSpec};

/// A source of decoded audio frames.
///
/// Only ever called from the driver domain; the real-time callback never
/// touches the decoder.
pub trait Decoder: Send {
    /// Decode the next frame of interleaved sample bytes.
    ///
    /// An empty frame means the end of the stream.
    fn decode(&mut self) -> Result<Vec<u8>>;

    /// Reposition so the next decoded sample is the one at `position`.
    fn seek_to(&mut self, position: Duration) -> Result<()>;

    /// Shape of the decoded output.
    fn spec(&self) -> StreamSpec;

    fn byte_count_for_sample_count(&self, samples: usize) -> usize {
        self.spec().byte_count_for_sample_count(samples)
    }

    fn sample_count_for_byte_count(&self, bytes: usize) -> usize {
        self.spec().sample_count_for_byte_count(bytes)
    }

    fn sample_count_for_position(&self, position: Duration) -> u64 {
        self.spec().sample_count_for_position(position)
    }

    fn position_for_sample_count(&self, samples: u64) -> Duration {
        self.spec().position_for_sample_count(samples)
    }
}

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Source bit depth (best-effort).
    pub bit_depth: Option<u16>,
    /// Total duration when the container reports it.
    pub duration: Option<Duration>,
}

/// Symphonia-backed [`Decoder`] for one local file.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    codec: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    spec: StreamSpec,
    info: SourceInfo,
    /// Samples still to drop after a seek landed before the requested time.
    skip_samples: u64,
}

impl SymphoniaDecoder {
    /// Open `path` and prepare to decode its default track as `sample_format`.
    pub fn open(path: &Path, sample_format: SampleFormat) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("probe {:?}", path))?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("No default audio track"))?;
        let track_id = track.id;
        let codec_params: CodecParameters = track.codec_params.clone();

        let channels = codec_params
            .channels
            .ok_or_else(|| anyhow!("Unknown channels"))?
            .count();
        let rate = codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("Unknown sample rate"))?;
        let channels = u16::try_from(channels).context("channel count")?;

        let codec = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .context("make codec")?;

        let info = SourceInfo {
            codec: codec_name_from_params(&codec_params),
            bit_depth: codec_params
                .bits_per_sample
                .or(codec_params.bits_per_coded_sample)
                .and_then(|v| u16::try_from(v).ok()),
            duration: duration_from_codec_params(&codec_params),
        };

        tracing::info!(
            path = %path.display(),
            rate_hz = rate,
            channels,
            codec = info.codec.as_deref().unwrap_or("unknown"),
            format = %sample_format,
            "decoder opened"
        );

        Ok(Self {
            format,
            codec,
            track_id,
            spec: StreamSpec::new(rate, channels, sample_format),
            info,
            skip_samples: 0,
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// Drop any seek pre-roll from the front of `bytes`.
    fn trim_preroll(&mut self, bytes: &mut Vec<u8>) {
        if self.skip_samples == 0 {
            return;
        }
        let have = self.spec.sample_count_for_byte_count(bytes.len());
        let drop = usize::try_from(self.skip_samples)
            .unwrap_or(usize::MAX)
            .min(have);
        bytes.drain(..self.spec.byte_count_for_sample_count(drop));
        self.skip_samples -= drop as u64;
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&mut self) -> Result<Vec<u8>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("end of file");
                    return Ok(Vec::new());
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.codec.reset();
                    continue;
                }
                Err(e) => return Err(e).context("read packet"),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!(error = msg, "skipping undecodable packet");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.codec.reset();
                    continue;
                }
                Err(e) => return Err(e).context("decode packet"),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let mut bytes = match self.spec.format {
                SampleFormat::I16 => interleaved_bytes(decoded, i16::to_ne_bytes),
                SampleFormat::I32 => interleaved_bytes(decoded, i32::to_ne_bytes),
                SampleFormat::F32 => interleaved_bytes(decoded, f32::to_ne_bytes),
            };
            self.trim_preroll(&mut bytes);
            if !bytes.is_empty() {
                return Ok(bytes);
            }
        }
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let time = Time::new(
            position.as_secs(),
            f64::from(position.subsec_nanos()) / 1_000_000_000.0,
        );
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .with_context(|| format!("seek to {position:?}"))?;
        self.codec.reset();
        self.skip_samples = seeked.required_ts.saturating_sub(seeked.actual_ts);
        tracing::debug!(
            required_ts = seeked.required_ts,
            actual_ts = seeked.actual_ts,
            "decoder seeked"
        );
        Ok(())
    }

    fn spec(&self) -> StreamSpec {
        self.spec
    }
}

/// Convert a decoded buffer to interleaved native-endian bytes of sample type `S`.
fn interleaved_bytes<S, const N: usize>(
    decoded: AudioBufferRef<'_>,
    to_bytes: fn(S) -> [u8; N],
) -> Vec<u8>
where
    S: ConvertibleSample,
{
    let mut sample_buf = SampleBuffer::<S>::new(decoded.frames() as u64, *decoded.spec());
    sample_buf.copy_interleaved_ref(decoded);
    sample_buf
        .samples()
        .iter()
        .flat_map(|s| to_bytes(*s))
        .collect()
}

/// Best-effort duration from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_from_codec_params(codec_params: &CodecParameters) -> Option<Duration> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_millis(frames.saturating_mul(1000) / rate))
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
