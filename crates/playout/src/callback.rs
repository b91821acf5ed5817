//! Real-time consumer: drains the ring buffer into the hardware's buffer.
//!
//! The hardware framework calls [`CallbackEngine::fill`] on its own thread.
//! One invocation runs a small step machine until the requested frame count
//! is satisfied or the stream completes:
//! - samples available: copy `min(available, still needed, step cap)` samples
//!   and keep going
//! - nothing available, file still decoding: underrun; zero the whole
//!   remaining region and count it as satisfied
//! - nothing available, file ended: stop early with [`CallbackResult::Complete`]
//!
//! `fill` never blocks, allocates, decodes or logs. Underruns are only counted
//! here; the driver domain reports them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::position::PositionTracker;
use crate::ring_buffer::RingBuffer;

/// State shared between the driver domain and the real-time callback.
#[derive(Debug)]
pub(crate) struct PlayoutShared {
    pub(crate) ring: RingBuffer,
    /// Set by the fill loop once the decoder returns an empty frame.
    pub(crate) file_ended: AtomicBool,
    pub(crate) position: PositionTracker,
    pub(crate) underrun_events: AtomicU64,
    pub(crate) underrun_samples: AtomicU64,
}

impl PlayoutShared {
    pub(crate) fn new(ring: RingBuffer) -> Self {
        Self {
            ring,
            file_ended: AtomicBool::new(false),
            position: PositionTracker::new(),
            underrun_events: AtomicU64::new(0),
            underrun_samples: AtomicU64::new(0),
        }
    }
}

/// What the hardware should do after a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackResult {
    /// More callbacks will follow.
    Continue,
    /// End of stream reached; the stream may be torn down.
    Complete,
}

/// Progress through one callback invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackStep {
    pub result: CallbackResult,
    /// Frames of the output buffer populated so far.
    pub frames: usize,
}

/// Handle the hardware binding invokes from its real-time thread.
#[derive(Clone, Debug)]
pub struct CallbackEngine {
    shared: Arc<PlayoutShared>,
    bytes_per_sample: usize,
    max_step_samples: usize,
}

impl CallbackEngine {
    pub(crate) fn new(
        shared: Arc<PlayoutShared>,
        bytes_per_sample: usize,
        max_step_samples: usize,
    ) -> Self {
        Self {
            shared,
            bytes_per_sample: bytes_per_sample.max(1),
            max_step_samples: max_step_samples.max(1),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    /// Populate up to `frames` sample-frames of `out`.
    ///
    /// On `Complete` the returned frame count may be short; the bytes past it
    /// are left untouched for the hardware binding to deal with.
    pub fn fill(&self, out: &mut [u8], frames: usize) -> CallbackStep {
        let frames = frames.min(out.len() / self.bytes_per_sample);
        let mut step = CallbackStep {
            result: CallbackResult::Continue,
            frames: 0,
        };
        while step.result == CallbackResult::Continue && step.frames < frames {
            step = self.step(out, frames, step);
        }
        step
    }

    /// One transition of the step machine.
    fn step(&self, out: &mut [u8], frames: usize, prev: CallbackStep) -> CallbackStep {
        let available = self.shared.ring.read_capacity();
        if available == 0 {
            self.on_empty(out, frames, prev)
        } else {
            self.on_available(out, available, frames, prev)
        }
    }

    fn on_available(
        &self,
        out: &mut [u8],
        available: usize,
        frames: usize,
        prev: CallbackStep,
    ) -> CallbackStep {
        let wanted = frames - prev.frames;
        let count = available.min(wanted).min(self.max_step_samples);
        let offset = prev.frames * self.bytes_per_sample;

        let read = self.shared.ring.read(&mut out[offset..], count);
        self.shared.position.advance(read as u64);

        CallbackStep {
            result: CallbackResult::Continue,
            frames: prev.frames + read,
        }
    }

    fn on_empty(&self, out: &mut [u8], frames: usize, prev: CallbackStep) -> CallbackStep {
        if self.shared.file_ended.load(Ordering::Acquire) {
            return CallbackStep {
                result: CallbackResult::Complete,
                frames: prev.frames,
            };
        }

        // Underrun: plug the gap with silence rather than stalling.
        let start = prev.frames * self.bytes_per_sample;
        let end = frames * self.bytes_per_sample;
        out[start..end].fill(0);
        self.shared.underrun_events.fetch_add(1, Ordering::Relaxed);
        self.shared
            .underrun_samples
            .fetch_add((frames - prev.frames) as u64, Ordering::Relaxed);

        CallbackStep {
            result: CallbackResult::Continue,
            frames,
        }
    }
}
