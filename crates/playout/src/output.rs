//! Audio output pipeline for one loaded file.
//!
//! [`AudioOutput`] owns the decoder, the in-progress frame, the ring buffer
//! and the hardware stream. It is driven from two sides:
//! - the driver domain calls [`AudioOutput::update`] repeatedly to decode and
//!   top up the ring buffer, plus `start`/`stop`/`seek_to`
//! - the hardware thread calls the [`CallbackEngine`] handed to the stream at
//!   construction, which drains the ring buffer
//!
//! Only the ring buffer and a few atomics are shared between the two.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::callback::{CallbackEngine, PlayoutShared};
use crate::config::PlayoutConfig;
use crate::decode::Decoder;
use crate::error::{OutputError, Result};
use crate::format::StreamSpec;
use crate::frame::FrameCursor;
use crate::ring_buffer::RingBuffer;
use crate::stream::{OutputStream, StreamConfigurator};

/// Playback state for one decoded file.
pub struct AudioOutput {
    decoder: Box<dyn Decoder>,
    frame: FrameCursor,
    shared: Arc<PlayoutShared>,
    stream: Box<dyn OutputStream>,
    config: PlayoutConfig,
    reported_underruns: u64,
}

impl AudioOutput {
    /// Build the ring buffer and ask `configurator` for a stream that drains it.
    pub fn new(
        decoder: Box<dyn Decoder>,
        configurator: &dyn StreamConfigurator,
        config: PlayoutConfig,
    ) -> Result<Self> {
        let spec = decoder.spec();
        let bytes_per_sample = decoder.byte_count_for_sample_count(1);
        let ring = RingBuffer::new(bytes_per_sample, config.ring_power);
        tracing::debug!(
            capacity_samples = ring.capacity(),
            capacity_bytes = ring.capacity_bytes(),
            "ring buffer allocated"
        );

        let shared = Arc::new(PlayoutShared::new(ring));
        let engine = CallbackEngine::new(shared.clone(), bytes_per_sample, config.max_step_samples);
        let stream = configurator
            .configure(engine, &spec)
            .map_err(OutputError::Stream)?;

        Ok(Self {
            decoder,
            frame: FrameCursor::new(),
            shared,
            stream,
            config,
            reported_underruns: 0,
        })
    }

    pub fn spec(&self) -> StreamSpec {
        self.decoder.spec()
    }

    /// Pre-fill the ring buffer, then activate the hardware stream.
    pub fn start(&mut self) -> Result<()> {
        self.pre_fill()?;
        self.stream.start().map_err(OutputError::Stream)?;
        tracing::info!(
            buffered_samples = self.buffered_samples(),
            "audio started"
        );
        Ok(())
    }

    /// Abort the hardware stream. Samples in flight inside the stream are lost.
    pub fn stop(&mut self) -> Result<()> {
        self.stream.abort().map_err(OutputError::Stream)?;
        tracing::info!("audio stopped");
        Ok(())
    }

    /// Whether the hardware stream reports itself inactive.
    pub fn is_stopped(&self) -> bool {
        !self.stream.is_active()
    }

    /// Whether the decoder has run out of data.
    ///
    /// Buffered samples may still be waiting to play.
    pub fn file_ended(&self) -> bool {
        self.shared.file_ended.load(Ordering::Acquire)
    }

    /// Playback position of the last sample handed to the hardware.
    pub fn current_position(&self) -> Duration {
        self.decoder
            .position_for_sample_count(self.shared.position.samples())
    }

    /// Samples drained by the callback since load (or since the last seek target).
    pub fn position_samples(&self) -> u64 {
        self.shared.position.samples()
    }

    /// Samples waiting in the ring buffer.
    pub fn buffered_samples(&self) -> usize {
        self.shared.ring.read_capacity()
    }

    /// Reposition playback to `position`, discarding everything decoded so far.
    ///
    /// The hardware stream must not be mid-callback: stop it first.
    pub fn seek_to(&mut self, position: Duration) -> Result<()> {
        self.decoder
            .seek_to(position)
            .map_err(OutputError::Decode)?;
        self.shared
            .position
            .set(self.decoder.sample_count_for_position(position));

        self.clear_frame();
        self.shared.ring.flush();
        tracing::info!(position_us = position.as_micros() as u64, "seeked");
        Ok(())
    }

    /// Fill the ring buffer until it holds the spin-up amount, is full, or the
    /// file ends.
    pub fn pre_fill(&mut self) -> Result<()> {
        let capacity_bytes = self.shared.ring.capacity_bytes();
        let mut more = true;
        let mut free = self.shared.ring.write_capacity();
        while more
            && free > 0
            && capacity_bytes - self.decoder.byte_count_for_sample_count(free)
                < self.config.spinup_bytes
        {
            more = self.update()?;
            free = self.shared.ring.write_capacity();
        }
        Ok(())
    }

    /// Decode if needed and move as much of the current frame as fits into the
    /// ring buffer.
    ///
    /// Returns whether more data is available; `false` once the decoder has
    /// returned an empty frame.
    pub fn update(&mut self) -> Result<bool> {
        let more = self.decode_if_frame_finished()?;
        if more {
            self.write_all_available()?;
        }

        let was_ended = self.shared.file_ended.swap(!more, Ordering::AcqRel);
        if !more && !was_ended {
            tracing::info!(
                buffered_samples = self.buffered_samples(),
                "end of file"
            );
        }
        self.report_underruns();
        Ok(more)
    }

    /// Pull a new frame once the current one is used up.
    ///
    /// Returns whether a non-empty frame is pending.
    fn decode_if_frame_finished(&mut self) -> Result<bool> {
        if self.frame.is_finished() {
            let frame = self.decoder.decode().map_err(OutputError::Decode)?;
            self.frame.replace(frame);
        }
        Ok(!self.frame.is_empty())
    }

    fn write_all_available(&mut self) -> Result<()> {
        let pending = self
            .decoder
            .sample_count_for_byte_count(self.frame.remaining().len());
        if pending == 0 {
            // Less than one whole sample left; it can never be played.
            tracing::debug!(
                bytes = self.frame.remaining().len(),
                "dropping partial sample at end of frame"
            );
            self.frame.clear();
            return Ok(());
        }

        let count = pending.min(self.shared.ring.write_capacity());
        if count > 0 {
            self.write_to_ring(count)?;
        }
        Ok(())
    }

    fn write_to_ring(&mut self, count: usize) -> Result<()> {
        let written = self.shared.ring.write(self.frame.remaining(), count);
        if written != count {
            return Err(OutputError::RingWrite {
                requested: count,
                written,
            });
        }
        self.frame
            .advance(self.decoder.byte_count_for_sample_count(written));
        Ok(())
    }

    fn clear_frame(&mut self) {
        self.frame.clear();
        self.shared.file_ended.store(false, Ordering::Release);
    }

    fn report_underruns(&mut self) {
        let events = self.shared.underrun_events.load(Ordering::Relaxed);
        if events > self.reported_underruns {
            tracing::info!(
                events = events - self.reported_underruns,
                total_samples = self.shared.underrun_samples.load(Ordering::Relaxed),
                "audio underrun; played silence"
            );
            self.reported_underruns = events;
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if self.stream.is_active() {
            if let Err(e) = self.stream.abort() {
                tracing::warn!("stream abort on close failed: {e:#}");
            }
        }
        tracing::debug!("closed output stream");
    }
}
