//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting the default device, a device by index, or by substring match
//! - choosing a stream config that plays a [`StreamSpec`] without conversion

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::format::StreamSpec;

/// Largest fixed hardware buffer we ask for, in frames.
const MAX_BUFFER_FRAMES: u32 = 16_384;

/// Pick a CPAL output device.
///
/// - If `needle` parses as an index, chooses the output device at that position
///   (as printed by [`list_devices`]).
/// - Otherwise, if `needle` is `Some`, chooses the first output device whose name
///   contains the substring (case-insensitive).
/// - Otherwise, returns the host default output device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        if let Ok(index) = needle.trim().parse::<usize>() {
            if index < devices.len() {
                return Ok(devices.swap_remove(index));
            }
            return Err(anyhow!("Bad device index: {index}"));
        }
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose an output config that plays `spec` natively.
///
/// Resampling and format conversion are out of scope, so the device must offer
/// the exact channel count, sample format and rate.
pub fn pick_output_config(
    device: &cpal::Device,
    spec: &StreamSpec,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();
    if ranges.is_empty() {
        return Err(anyhow!("No supported output configs"));
    }

    ranges
        .into_iter()
        .find(|range| {
            range_supports(
                range.channels(),
                range.sample_format(),
                range.min_sample_rate(),
                range.max_sample_rate(),
                spec,
            )
        })
        .map(|range| range.with_sample_rate(spec.rate))
        .ok_or_else(|| {
            anyhow!(
                "Device cannot play {} Hz, {} channel(s), {}",
                spec.rate,
                spec.channels,
                spec.format
            )
        })
}

/// Prefer a fixed buffer size if the device advertises one.
///
/// Returns `None` when the device only supports the default buffer size.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(clamp_buffer_frames(*min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Names of the available output devices, in index order.
pub fn list_devices(host: &cpal::Host) -> Result<Vec<String>> {
    let devices = host.output_devices().context("No output devices")?;
    let mut out = Vec::new();
    for d in devices {
        out.push(d.description()?.to_string());
    }
    Ok(out)
}

fn range_supports(
    channels: u16,
    format: cpal::SampleFormat,
    min_rate: u32,
    max_rate: u32,
    spec: &StreamSpec,
) -> bool {
    channels == spec.channels
        && format == spec.format.to_cpal()
        && (min_rate..=max_rate).contains(&spec.rate)
}

/// Largest advertised buffer, capped at [`MAX_BUFFER_FRAMES`] unless the
/// device's minimum is already above it.
fn clamp_buffer_frames(min: u32, max: u32) -> u32 {
    if max > MAX_BUFFER_FRAMES {
        if min > MAX_BUFFER_FRAMES { min } else { MAX_BUFFER_FRAMES }
    } else {
        max
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleFormat;

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }

    #[test]
    fn range_supports_requires_exact_shape() {
        let spec = StreamSpec::new(44_100, 2, SampleFormat::F32);
        assert!(range_supports(2, cpal::SampleFormat::F32, 8_000, 192_000, &spec));
        assert!(!range_supports(1, cpal::SampleFormat::F32, 8_000, 192_000, &spec));
        assert!(!range_supports(2, cpal::SampleFormat::I16, 8_000, 192_000, &spec));
        assert!(!range_supports(2, cpal::SampleFormat::F32, 48_000, 96_000, &spec));
    }

    #[test]
    fn clamp_buffer_frames_prefers_max_up_to_cap() {
        assert_eq!(clamp_buffer_frames(64, 4096), 4096);
        assert_eq!(clamp_buffer_frames(64, 1 << 20), MAX_BUFFER_FRAMES);
        assert_eq!(clamp_buffer_frames(1 << 15, 1 << 20), 1 << 15);
    }
}
