//! Error types for the playout pipeline and player.
//!
//! Driver-domain operations (`update`, `seek_to`, `start`, ...) report these
//! synchronously. The real-time callback never produces an error; it can only
//! choose between continuing and completing.

use thiserror::Error;

use crate::player::State;

/// Failures surfaced by [`AudioOutput`](crate::output::AudioOutput).
#[derive(Error, Debug)]
pub enum OutputError {
    /// The ring buffer accepted fewer bytes than its reported capacity allowed.
    ///
    /// This means the buffer implementation is broken; it is never retried.
    #[error("ring buffer short write: wrote {written} of {requested} samples")]
    RingWrite { requested: usize, written: usize },

    /// The decode engine reported a failure.
    #[error("decode failed: {0:#}")]
    Decode(anyhow::Error),

    /// The hardware stream could not be built, started or aborted.
    #[error("output stream error: {0:#}")]
    Stream(anyhow::Error),

    /// The file could not be opened for decoding.
    #[error("could not open file: {0:#}")]
    Open(anyhow::Error),
}

/// Reasons a [`Player`](crate::player::Player) command was refused or failed.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The command is not valid in the current state.
    #[error("cannot {command} while {state}")]
    BadState { command: &'static str, state: State },

    /// The command arguments were malformed.
    #[error("bad command: {0}")]
    BadCommand(String),

    /// The audio output failed while executing the command.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Convenience result alias for output operations.
pub type Result<T> = std::result::Result<T, OutputError>;
