use std::time::Duration;

/// Size in bytes of one nominal decode buffer.
pub const BUFFER_SIZE: usize = 16_384;

/// Number of bytes to load into the ring buffer before starting output.
pub const SPINUP_SIZE: usize = 2 * BUFFER_SIZE;

/// Ring buffer depth: the buffer holds `1 << RINGBUF_POWER` samples.
pub const RINGBUF_POWER: u32 = 16;

/// Upper bound on samples moved by one callback step.
pub const MAX_STEP_SAMPLES: usize = 1 << 20;

/// Minimum interval between position reports while playing.
pub const POSITION_PERIOD: Duration = Duration::from_millis(500);

/// Sleep between iterations of the driver loop.
pub const LOOP_PERIOD: Duration = Duration::from_micros(1);

/// Buffering parameters for one [`AudioOutput`](crate::output::AudioOutput).
#[derive(Clone, Debug)]
pub struct PlayoutConfig {
    /// Ring buffer holds `1 << ring_power` samples.
    pub ring_power: u32,
    /// Pre-fill stops once this many bytes are buffered.
    pub spinup_bytes: usize,
    /// Max samples transferred per callback step.
    pub max_step_samples: usize,
}

impl Default for PlayoutConfig {
    /// Build-time defaults.
    fn default() -> Self {
        Self {
            ring_power: RINGBUF_POWER,
            spinup_bytes: SPINUP_SIZE,
            max_step_samples: MAX_STEP_SAMPLES,
        }
    }
}
