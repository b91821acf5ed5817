//! Hardware stream interface consumed by [`AudioOutput`](crate::output::AudioOutput).
//!
//! Bindings route every hardware buffer through a [`CallbackGate`], which
//! supplies what the hardware frameworks don't:
//! - a completed stream goes inactive and plays silence from then on
//! - closing the gate waits out a callback already in flight, so once
//!   `abort` returns the ring buffer has no reader and may be flushed

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::callback::{CallbackEngine, CallbackResult, CallbackStep};
use crate::format::StreamSpec;

/// A hardware output stream driving a [`CallbackEngine`] from its own thread.
pub trait OutputStream {
    /// Begin invoking the callback.
    fn start(&mut self) -> Result<()>;

    /// Stop invoking the callback.
    ///
    /// On return no callback is running and none will touch the ring buffer
    /// until the next `start`. In-flight audio may be dropped.
    fn abort(&mut self) -> Result<()>;

    /// Whether the stream is running, as reported by the hardware side.
    ///
    /// Becomes `false` after `abort` and after the callback signals completion.
    fn is_active(&self) -> bool;
}

/// Builds output streams for decoded audio of a given shape.
pub trait StreamConfigurator {
    /// Configure a stream that plays `spec`-shaped audio by calling `engine`.
    fn configure(
        &self,
        engine: CallbackEngine,
        spec: &StreamSpec,
    ) -> Result<Box<dyn OutputStream>>;
}

/// Activity flag plus in-callback marker shared by a stream and its callback.
///
/// Both flags use sequentially consistent ordering: the callback raises
/// `in_callback` before reading `active`, and `close` lowers `active` before
/// reading `in_callback`, so at least one side always sees the other.
#[derive(Debug, Default)]
pub struct CallbackGate {
    active: AtomicBool,
    in_callback: AtomicBool,
}

impl CallbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let callbacks reach the engine.
    pub fn open(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stop callbacks reaching the engine, waiting for one in flight.
    ///
    /// Must not be called from the callback thread.
    pub fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        while self.in_callback.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Body of a hardware callback: fill `out` with up to `frames` frames.
    ///
    /// While closed, `out` is silenced and the engine is not called
    /// (`None`). On `Complete` the unfilled tail is zeroed and the gate
    /// closes itself.
    pub fn render(
        &self,
        engine: &CallbackEngine,
        out: &mut [u8],
        frames: usize,
    ) -> Option<CallbackStep> {
        let Some(_guard) = self.enter() else {
            out.fill(0);
            return None;
        };

        let step = engine.fill(out, frames);
        if step.result == CallbackResult::Complete {
            let filled = (step.frames * engine.bytes_per_sample()).min(out.len());
            out[filled..].fill(0);
            self.active.store(false, Ordering::SeqCst);
        }
        Some(step)
    }

    fn enter(&self) -> Option<InCallback<'_>> {
        self.in_callback.store(true, Ordering::SeqCst);
        if self.active.load(Ordering::SeqCst) {
            Some(InCallback(&self.in_callback))
        } else {
            self.in_callback.store(false, Ordering::SeqCst);
            None
        }
    }
}

/// Clears the in-callback marker when the callback body ends.
struct InCallback<'a>(&'a AtomicBool);

impl Drop for InCallback<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::callback::PlayoutShared;
    use crate::ring_buffer::RingBuffer;

    fn engine_with(samples: &[u8], file_ended: bool) -> CallbackEngine {
        let shared = Arc::new(PlayoutShared::new(RingBuffer::new(1, 6)));
        shared.ring.write(samples, samples.len());
        shared.file_ended.store(file_ended, Ordering::Release);
        CallbackEngine::new(shared, 1, 1024)
    }

    #[test]
    fn complete_zeroes_tail_and_closes() {
        let engine = engine_with(&[4, 5, 6], true);
        let gate = CallbackGate::new();
        gate.open();

        let mut out = [0xffu8; 8];
        let step = gate.render(&engine, &mut out, 8).unwrap();
        assert_eq!(step.result, CallbackResult::Complete);
        assert_eq!(step.frames, 3);
        assert_eq!(out, [4, 5, 6, 0, 0, 0, 0, 0]);
        assert!(!gate.is_open());
    }

    #[test]
    fn closed_gate_plays_silence_without_draining() {
        let engine = engine_with(&[1, 2, 3, 4], false);
        let gate = CallbackGate::new();

        let mut out = [0xffu8; 4];
        assert!(gate.render(&engine, &mut out, 4).is_none());
        assert_eq!(out, [0; 4]);

        gate.open();
        let step = gate.render(&engine, &mut out, 4).unwrap();
        assert_eq!(step.result, CallbackResult::Continue);
        assert_eq!(out, [1, 2, 3, 4]);
        assert!(gate.is_open());
    }

    #[test]
    fn after_complete_later_callbacks_are_silent() {
        let engine = engine_with(&[9], true);
        let gate = CallbackGate::new();
        gate.open();

        let mut out = [0u8; 4];
        gate.render(&engine, &mut out, 4);
        let mut out = [0xffu8; 4];
        assert!(gate.render(&engine, &mut out, 4).is_none());
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn close_waits_for_callback_in_flight() {
        let gate = Arc::new(CallbackGate::new());
        gate.open();
        let held = gate.enter().unwrap();

        let closer = {
            let gate = gate.clone();
            thread::spawn(move || gate.close())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!closer.is_finished());
        assert!(!gate.is_open());

        drop(held);
        closer.join().unwrap();
        assert!(gate.enter().is_none());
    }

    #[test]
    fn flush_after_close_never_races_the_reader() {
        let shared = Arc::new(PlayoutShared::new(RingBuffer::new(1, 4)));
        let engine = CallbackEngine::new(shared.clone(), 1, 1024);
        let gate = Arc::new(CallbackGate::new());
        let done = Arc::new(AtomicBool::new(false));

        let callback = {
            let gate = gate.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut out = [0u8; 3];
                while !done.load(Ordering::Relaxed) {
                    gate.render(&engine, &mut out, 3);
                }
            })
        };

        for _ in 0..2_000 {
            let room = shared.ring.write_capacity();
            shared.ring.write(&[7; 16], room);
            gate.open();
            thread::yield_now();
            gate.close();
            shared.ring.flush();
            assert_eq!(shared.ring.read_capacity(), 0);
            assert_eq!(shared.ring.write_capacity(), shared.ring.capacity());
        }

        done.store(true, Ordering::Relaxed);
        callback.join().unwrap();
    }
}
