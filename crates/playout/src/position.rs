use std::sync::atomic::{AtomicU64, Ordering};

/// Count of samples that have left the ring buffer towards the hardware.
///
/// Advanced only by the callback as it drains the buffer, so it lags the
/// decode position by whatever is buffered. Reset only by seeks.
#[derive(Debug, Default)]
pub struct PositionTracker {
    drained: AtomicU64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples drained so far.
    pub fn samples(&self) -> u64 {
        self.drained.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, samples: u64) {
        self.drained.fetch_add(samples, Ordering::AcqRel);
    }

    pub(crate) fn set(&self, samples: u64) {
        self.drained.store(samples, Ordering::Release);
    }
}
