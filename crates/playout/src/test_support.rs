//! In-crate test doubles for the decode engine and the hardware stream.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::callback::{CallbackEngine, CallbackStep};
use crate::decode::Decoder;
use crate::format::{SampleFormat, StreamSpec};
use crate::stream::{CallbackGate, OutputStream, StreamConfigurator};

/// Spec used by the scripted decoder. Its byte conversions are overridden to
/// one byte per sample so tests can reason in bytes.
pub(crate) fn byte_spec() -> StreamSpec {
    StreamSpec::new(4_000, 1, SampleFormat::I16)
}

#[derive(Default)]
struct Script {
    frames: VecDeque<Vec<u8>>,
    seeks: Vec<Duration>,
    fail_next: bool,
}

/// Decoder returning pre-baked frames, then empty frames forever.
///
/// Clones share the same script, so a test can keep a handle after handing the
/// decoder to the pipeline.
#[derive(Clone)]
pub(crate) struct ScriptedDecoder {
    spec: StreamSpec,
    script: Arc<Mutex<Script>>,
}

impl ScriptedDecoder {
    pub(crate) fn new(spec: StreamSpec, frames: Vec<Vec<u8>>) -> Self {
        Self {
            spec,
            script: Arc::new(Mutex::new(Script {
                frames: frames.into(),
                ..Script::default()
            })),
        }
    }

    pub(crate) fn seeks(&self) -> Vec<Duration> {
        self.script.lock().unwrap().seeks.clone()
    }

    pub(crate) fn fail_next_decode(&self) {
        self.script.lock().unwrap().fail_next = true;
    }
}

impl Decoder for ScriptedDecoder {
    fn decode(&mut self) -> Result<Vec<u8>> {
        let mut script = self.script.lock().unwrap();
        if std::mem::take(&mut script.fail_next) {
            return Err(anyhow!("scripted decode failure"));
        }
        Ok(script.frames.pop_front().unwrap_or_default())
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        self.script.lock().unwrap().seeks.push(position);
        Ok(())
    }

    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn byte_count_for_sample_count(&self, samples: usize) -> usize {
        samples
    }

    fn sample_count_for_byte_count(&self, bytes: usize) -> usize {
        bytes
    }
}

/// Stream that never runs a thread; tests play the hardware side through
/// [`ManualConfigurator::render`] or call the engine directly.
struct ManualStream {
    gate: Arc<CallbackGate>,
}

impl OutputStream for ManualStream {
    fn start(&mut self) -> Result<()> {
        self.gate.open();
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.gate.close();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.gate.is_open()
    }
}

/// Configurator that hands out [`ManualStream`]s and keeps the last engine.
#[derive(Clone, Default)]
pub(crate) struct ManualConfigurator {
    last: Arc<Mutex<Option<(CallbackEngine, Arc<CallbackGate>)>>>,
}

impl ManualConfigurator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn last(&self) -> (CallbackEngine, Arc<CallbackGate>) {
        self.last
            .lock()
            .unwrap()
            .clone()
            .expect("no stream configured")
    }

    /// Engine of the most recently configured stream.
    pub(crate) fn engine(&self) -> CallbackEngine {
        self.last().0
    }

    pub(crate) fn is_active(&self) -> bool {
        self.last().1.is_open()
    }

    /// Run one hardware callback the way a real binding does.
    pub(crate) fn render(&self, out: &mut [u8], frames: usize) -> Option<CallbackStep> {
        let (engine, gate) = self.last();
        gate.render(&engine, out, frames)
    }
}

impl StreamConfigurator for ManualConfigurator {
    fn configure(
        &self,
        engine: CallbackEngine,
        _spec: &StreamSpec,
    ) -> Result<Box<dyn OutputStream>> {
        let gate = Arc::new(CallbackGate::new());
        *self.last.lock().unwrap() = Some((engine, gate.clone()));
        Ok(Box::new(ManualStream { gate }))
    }
}
