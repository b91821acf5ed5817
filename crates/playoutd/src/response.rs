//! Response lines written to stdout: `<CODE> <args...>`.

use std::fmt;
use std::io::Write;

pub const MSG_OHAI: &str = "playoutd at your service";
pub const MSG_TTFN: &str = "Sleep now";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    /// Starting up.
    Ohai,
    /// Shutting down.
    Ttfn,
    /// Command accepted; echoes the command line.
    Okay,
    /// Command malformed or not valid in the current state.
    What,
    /// Command failed because of the environment (file, device, decoder).
    Fail,
    /// State change: `<old> <new>`.
    Stat,
    /// Playback position in microseconds.
    Time,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Response::Ohai => "OHAI",
            Response::Ttfn => "TTFN",
            Response::Okay => "OKAY",
            Response::What => "WHAT",
            Response::Fail => "FAIL",
            Response::Stat => "STAT",
            Response::Time => "TIME",
        };
        f.write_str(code)
    }
}

/// Format one response line, without the trailing newline.
pub fn line(code: Response, message: impl fmt::Display) -> String {
    let message = message.to_string();
    if message.is_empty() {
        code.to_string()
    } else {
        format!("{code} {message}")
    }
}

/// Write one response line to stdout.
pub fn respond(code: Response, message: impl fmt::Display) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{}", line(code, message)).and_then(|_| out.flush()) {
        tracing::warn!("stdout write failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_code_and_message() {
        assert_eq!(line(Response::Okay, "play"), "OKAY play");
        assert_eq!(line(Response::Stat, format!("{} {}", "Ejected", "Stopped")), "STAT Ejected Stopped");
        assert_eq!(line(Response::Time, 1_500_000u64), "TIME 1500000");
        assert_eq!(line(Response::Ttfn, ""), "TTFN");
    }
}
