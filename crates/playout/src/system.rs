//! Audio system: the selected output device plus everything needed to turn a
//! path into a ready-to-start [`AudioOutput`].

use std::path::Path;

use anyhow::Result as AnyResult;
use cpal::traits::DeviceTrait;

use crate::config::PlayoutConfig;
use crate::decode::SymphoniaDecoder;
use crate::device::pick_device;
use crate::error::{OutputError, Result};
use crate::format::SampleFormat;
use crate::output::AudioOutput;
use crate::playback::CpalConfigurator;

/// Opens files into audio outputs.
pub trait Loader {
    fn load(&self, path: &str) -> Result<AudioOutput>;
}

/// CPAL host and device, with the buffering and format used for every load.
pub struct AudioSystem {
    configurator: CpalConfigurator,
    config: PlayoutConfig,
    format: SampleFormat,
}

impl AudioSystem {
    /// Select an output device on the default host.
    ///
    /// `device` is an index or a name substring; `None` picks the host default.
    pub fn new(device: Option<&str>, format: SampleFormat, config: PlayoutConfig) -> AnyResult<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, device)?;
        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(device = %name, %format, "audio system ready");

        Ok(Self {
            configurator: CpalConfigurator::new(device),
            config,
            format,
        })
    }
}

impl Loader for AudioSystem {
    fn load(&self, path: &str) -> Result<AudioOutput> {
        let decoder = SymphoniaDecoder::open(Path::new(path), self.format).map_err(OutputError::Open)?;
        let info = decoder.info();
        tracing::debug!(
            duration_ms = info.duration.map(|d| d.as_millis() as u64),
            bit_depth = info.bit_depth,
            "source info"
        );
        AudioOutput::new(Box::new(decoder), &self.configurator, self.config.clone())
    }
}
