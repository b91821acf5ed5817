//! CPAL binding for the callback engine.
//!
//! Opens a raw output stream in the decoder's native format and hands each
//! hardware buffer to the engine through a [`CallbackGate`]. CPAL has no
//! notion of a callback asking to finish, and `pause` does not wait for a
//! running callback; the gate covers both.

use std::sync::Arc;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::callback::CallbackEngine;
use crate::device::{pick_buffer_size, pick_output_config};
use crate::format::StreamSpec;
use crate::stream::{CallbackGate, OutputStream, StreamConfigurator};

/// Builds CPAL output streams on one device.
pub struct CpalConfigurator {
    device: cpal::Device,
}

impl CpalConfigurator {
    pub fn new(device: cpal::Device) -> Self {
        Self { device }
    }
}

impl StreamConfigurator for CpalConfigurator {
    fn configure(
        &self,
        engine: CallbackEngine,
        spec: &StreamSpec,
    ) -> Result<Box<dyn OutputStream>> {
        let supported = pick_output_config(&self.device, spec)?;
        let mut config = supported.config();
        if let Some(buffer_size) = pick_buffer_size(&supported) {
            config.buffer_size = buffer_size;
        }
        tracing::info!(
            rate = config.sample_rate,
            channels = config.channels,
            format = %spec.format,
            buffer = ?config.buffer_size,
            "output stream config"
        );

        let channels = usize::from(config.channels.max(1));
        let gate = Arc::new(CallbackGate::new());
        let gate_cb = gate.clone();

        let err_fn = |err| tracing::warn!("stream error: {err}");

        let stream = self
            .device
            .build_output_stream_raw(
                &config,
                spec.format.to_cpal(),
                move |data: &mut cpal::Data, _| {
                    let frames = data.len() / channels;
                    gate_cb.render(&engine, data.bytes_mut(), frames);
                },
                err_fn,
                None,
            )
            .context("build output stream")?;

        Ok(Box::new(CpalStream { stream, gate }))
    }
}

/// A configured CPAL stream plus the gate its callback runs behind.
pub struct CpalStream {
    stream: cpal::Stream,
    gate: Arc<CallbackGate>,
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<()> {
        self.gate.open();
        if let Err(e) = self.stream.play() {
            self.gate.close();
            return Err(e).context("start output stream");
        }
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.gate.close();
        self.stream.pause().context("pause output stream")
    }

    fn is_active(&self) -> bool {
        self.gate.is_open()
    }
}
