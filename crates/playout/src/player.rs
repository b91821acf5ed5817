//! Control-path state machine sitting on top of [`AudioOutput`].
//!
//! The player owns at most one loaded output and moves between
//! [`State::Ejected`], [`State::Stopped`] and [`State::Playing`] until it is
//! told to quit. Every transition is reported to the state listener; while
//! playing, [`Player::update`] also reports the position at a fixed period.

use std::fmt;
use std::time::Duration;

use crate::error::PlayerError;
use crate::output::AudioOutput;
use crate::system::Loader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing loaded.
    Ejected,
    /// Loaded, not playing.
    Stopped,
    Playing,
    /// Shutting down; no further commands are meaningful.
    Quitting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Ejected => "Ejected",
            State::Stopped => "Stopped",
            State::Playing => "Playing",
            State::Quitting => "Quitting",
        };
        f.write_str(name)
    }
}

pub type PositionListener = Box<dyn FnMut(Duration)>;
pub type StateListener = Box<dyn FnMut(State, State)>;

pub struct Player<L: Loader> {
    loader: L,
    state: State,
    output: Option<AudioOutput>,

    position_listener: Option<PositionListener>,
    position_period: Duration,
    /// Last reported position; `None` forces the next update to report.
    position_last: Option<Duration>,

    state_listener: Option<StateListener>,
}

impl<L: Loader> Player<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            state: State::Ejected,
            output: None,
            position_listener: None,
            position_period: Duration::ZERO,
            position_last: None,
            state_listener: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Call `listener` with the playback position at most once per `period`
    /// of played audio, and right after every load or seek.
    pub fn set_position_listener(&mut self, period: Duration, listener: PositionListener) {
        self.position_listener = Some(listener);
        self.position_period = period;
    }

    /// Call `listener` with `(old, new)` on every state change.
    pub fn set_state_listener(&mut self, listener: StateListener) {
        self.state_listener = Some(listener);
    }

    /// Load `path`, replacing anything already loaded.
    ///
    /// On failure the player ends up ejected.
    pub fn load(&mut self, path: &str) -> Result<(), PlayerError> {
        if path.is_empty() {
            return Err(PlayerError::BadCommand("load needs a file name".to_string()));
        }

        // Tear down the old stream before the new one claims the device.
        self.output = None;
        match self.loader.load(path) {
            Ok(output) => {
                let spec = output.spec();
                tracing::info!(
                    path,
                    rate = spec.rate,
                    channels = spec.channels,
                    format = %spec.format,
                    "loaded"
                );
                self.output = Some(output);
                self.position_last = None;
                self.set_state(State::Stopped);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path, "load failed: {e:#}");
                self.eject_output();
                Err(e.into())
            }
        }
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        self.output_in("play", &[State::Stopped])?.start()?;
        self.set_state(State::Playing);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), PlayerError> {
        self.output_in("stop", &[State::Playing])?.stop()?;
        self.set_state(State::Stopped);
        Ok(())
    }

    pub fn eject(&mut self) -> Result<(), PlayerError> {
        self.output_in("eject", &[State::Stopped, State::Playing])?;
        self.eject_output();
        Ok(())
    }

    /// Eject if anything is loaded, then enter [`State::Quitting`].
    pub fn quit(&mut self) {
        self.eject_output();
        self.set_state(State::Quitting);
    }

    /// Seek to a position given as `<integer>[ ]<unit>`; see [`parse_seek_time`].
    ///
    /// The stream is stopped around the seek while playing, then restarted.
    pub fn seek(&mut self, time: &str) -> Result<(), PlayerError> {
        let playing = self.state == State::Playing;
        let output = self.output_in("seek", &[State::Stopped, State::Playing])?;
        let position = parse_seek_time(time)?;

        if playing {
            output.stop()?;
        }
        let sought = output.seek_to(position);
        if playing {
            output.start()?;
        }
        sought?;

        self.position_last = None;
        Ok(())
    }

    /// One driver-loop iteration: notice finished playback, report the
    /// position, and keep the ring buffer topped up.
    ///
    /// A failing output update ejects the file before the error is returned.
    pub fn update(&mut self) -> Result<(), PlayerError> {
        if self.state == State::Playing {
            if self.output.as_ref().is_none_or(AudioOutput::is_stopped) {
                tracing::info!("playback finished");
                self.eject_output();
            } else {
                self.send_position_if_ready();
            }
        }

        if matches!(self.state, State::Stopped | State::Playing) {
            if let Some(output) = self.output.as_mut() {
                if let Err(e) = output.update() {
                    tracing::warn!("output update failed: {e:#}");
                    self.eject_output();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// The loaded output, provided the current state is one of `allowed`.
    fn output_in(
        &mut self,
        command: &'static str,
        allowed: &[State],
    ) -> Result<&mut AudioOutput, PlayerError> {
        let state = self.state;
        match self.output.as_mut() {
            Some(output) if allowed.contains(&state) => Ok(output),
            _ => Err(PlayerError::BadState { command, state }),
        }
    }

    fn eject_output(&mut self) {
        self.output = None;
        self.position_last = None;
        if matches!(self.state, State::Stopped | State::Playing) {
            self.set_state(State::Ejected);
        }
    }

    fn send_position_if_ready(&mut self) {
        let (Some(listener), Some(output)) = (self.position_listener.as_mut(), self.output.as_ref())
        else {
            return;
        };

        let position = output.current_position();
        let ready = match self.position_last {
            None => true,
            Some(last) => position.saturating_sub(last) >= self.position_period,
        };
        if ready {
            listener(position);
            self.position_last = Some(position);
        }
    }

    fn set_state(&mut self, state: State) {
        let old = std::mem::replace(&mut self.state, state);
        tracing::debug!(%old, new = %state, "state change");
        if let Some(listener) = self.state_listener.as_mut() {
            listener(old, state);
        }
    }
}

/// Parse a seek target of the form `<integer>[ ]<unit>`.
///
/// Units: none (microseconds), `s`/`sec`/`secs`, `m`/`min`/`mins`,
/// `h`/`hour`/`hours`.
pub fn parse_seek_time(time: &str) -> Result<Duration, PlayerError> {
    let time = time.trim();
    let digits = time
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(time.len());
    let (number, unit) = time.split_at(digits);

    let bad = || PlayerError::BadCommand(format!("bad seek time: {time:?}"));
    let value: u64 = number.parse().map_err(|_| bad())?;

    let scale: u64 = match unit.trim_start() {
        "" => return Ok(Duration::from_micros(value)),
        "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hour" | "hours" => 60 * 60,
        _ => return Err(bad()),
    };
    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;

    use crate::callback::CallbackResult;
    use crate::config::PlayoutConfig;
    use crate::error::OutputError;
    use crate::test_support::{ManualConfigurator, ScriptedDecoder, byte_spec};

    /// Loads ten 1000-byte frames for any path except `"missing"`.
    #[derive(Default)]
    struct TestLoader {
        configurator: ManualConfigurator,
        last: RefCell<Option<ScriptedDecoder>>,
    }

    impl Loader for TestLoader {
        fn load(&self, path: &str) -> crate::error::Result<AudioOutput> {
            if path == "missing" {
                return Err(OutputError::Open(anyhow!("no such file")));
            }
            let frames = (0..10).map(|_| vec![1u8; 1000]).collect();
            let decoder = ScriptedDecoder::new(byte_spec(), frames);
            *self.last.borrow_mut() = Some(decoder.clone());
            let config = PlayoutConfig {
                ring_power: 10,
                spinup_bytes: 256,
                ..PlayoutConfig::default()
            };
            AudioOutput::new(Box::new(decoder), &self.configurator, config)
        }
    }

    fn player() -> (Player<TestLoader>, ManualConfigurator, Rc<RefCell<Vec<(State, State)>>>) {
        let loader = TestLoader::default();
        let cfg = loader.configurator.clone();
        let mut player = Player::new(loader);
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        player.set_state_listener(Box::new(move |old, new| sink.borrow_mut().push((old, new))));
        (player, cfg, changes)
    }

    #[test]
    fn parse_seek_time_units() {
        assert_eq!(parse_seek_time("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_seek_time("3 min").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_seek_time("1hour").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_seek_time("15").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_seek_time("  4 secs ").unwrap(), Duration::from_secs(4));
    }

    #[test]
    fn parse_seek_time_rejects_garbage() {
        for bad in ["5 fortnights", "", "s", "-3s", "1.5s", "99999999999999999999h"] {
            assert!(
                matches!(parse_seek_time(bad), Err(PlayerError::BadCommand(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn commands_rejected_in_wrong_state() {
        let (mut player, _, _) = player();
        assert!(matches!(
            player.play(),
            Err(PlayerError::BadState { command: "play", state: State::Ejected })
        ));
        assert!(matches!(player.seek("1s"), Err(PlayerError::BadState { .. })));
        assert!(matches!(player.eject(), Err(PlayerError::BadState { .. })));

        player.load("song.flac").unwrap();
        assert!(matches!(
            player.stop(),
            Err(PlayerError::BadState { command: "stop", state: State::Stopped })
        ));
    }

    #[test]
    fn load_play_stop_eject_report_transitions() {
        let (mut player, cfg, changes) = player();
        player.load("song.flac").unwrap();
        player.play().unwrap();
        assert!(cfg.is_active());
        player.stop().unwrap();
        assert!(!cfg.is_active());
        player.eject().unwrap();

        assert_eq!(player.state(), State::Ejected);
        assert_eq!(
            *changes.borrow(),
            vec![
                (State::Ejected, State::Stopped),
                (State::Stopped, State::Playing),
                (State::Playing, State::Stopped),
                (State::Stopped, State::Ejected),
            ]
        );
    }

    #[test]
    fn load_empty_path_is_bad_command() {
        let (mut player, _, changes) = player();
        assert!(matches!(player.load(""), Err(PlayerError::BadCommand(_))));
        assert_eq!(player.state(), State::Ejected);
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn failed_load_ejects() {
        let (mut player, _, _) = player();
        player.load("song.flac").unwrap();
        let err = player.load("missing").unwrap_err();
        assert!(matches!(err, PlayerError::Output(OutputError::Open(_))));
        assert_eq!(player.state(), State::Ejected);
    }

    #[test]
    fn seek_while_playing_restarts_stream() {
        let (mut player, cfg, _) = player();
        player.load("song.flac").unwrap();
        player.play().unwrap();

        player.seek("1s").unwrap();
        assert_eq!(player.state(), State::Playing);
        assert!(cfg.is_active());
        let script = player.loader.last.borrow().clone().unwrap();
        assert_eq!(script.seeks(), vec![Duration::from_secs(1)]);

        assert!(matches!(player.seek("1 fortnight"), Err(PlayerError::BadCommand(_))));
        assert_eq!(script.seeks().len(), 1);
    }

    #[test]
    fn ejects_once_stream_completes_after_last_sample() {
        let (mut player, cfg, changes) = player();
        player.load("song.flac").unwrap();
        player.play().unwrap();

        let mut out = vec![0u8; 200];
        let mut played = 0;
        let mut completed = false;
        for _ in 0..200 {
            player.update().unwrap();
            if player.state() == State::Ejected {
                break;
            }
            assert!(!completed, "still playing after the stream completed");
            if let Some(step) = cfg.render(&mut out, 200) {
                played += step.frames;
                completed = step.result == CallbackResult::Complete;
            }
        }

        assert!(completed);
        assert_eq!(played, 10 * 1000);
        assert!(!cfg.is_active());
        assert_eq!(player.state(), State::Ejected);
        assert_eq!(changes.borrow().last(), Some(&(State::Playing, State::Ejected)));
    }

    #[test]
    fn seek_while_playing_leaves_no_reader_behind() {
        let (mut player, cfg, _) = player();
        player.load("song.flac").unwrap();
        player.play().unwrap();
        let mut out = vec![0u8; 300];
        cfg.render(&mut out, 300);

        player.seek("0").unwrap();
        assert!(cfg.is_active());

        // The restart pre-filled exactly one fresh frame into a flushed ring.
        let output = player.output.as_ref().unwrap();
        assert_eq!(output.buffered_samples(), 1000);
        assert_eq!(output.position_samples(), 0);

        let step = cfg.render(&mut out, 300).unwrap();
        assert_eq!(step.result, CallbackResult::Continue);
        assert_eq!(step.frames, 300);
        assert_eq!(player.output.as_ref().unwrap().position_samples(), 300);
    }

    #[test]
    fn position_reported_once_per_period() {
        let (mut player, cfg, _) = player();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        player.set_position_listener(
            Duration::from_millis(500),
            Box::new(move |p| sink.borrow_mut().push(p)),
        );
        player.load("song.flac").unwrap();
        player.play().unwrap();

        // 250 samples at 4 kHz is 62.5 ms per iteration.
        let mut out = vec![0u8; 250];
        for _ in 0..9 {
            player.update().unwrap();
            cfg.engine().fill(&mut out, 250);
        }

        assert_eq!(
            *reports.borrow(),
            vec![Duration::ZERO, Duration::from_millis(500)]
        );

        player.stop().unwrap();
        player.seek("0").unwrap();
        player.play().unwrap();
        player.update().unwrap();
        assert_eq!(reports.borrow().last(), Some(&Duration::ZERO));
        assert_eq!(reports.borrow().len(), 3);
    }

    #[test]
    fn quit_ejects_then_quits() {
        let (mut player, cfg, changes) = player();
        player.load("song.flac").unwrap();
        player.play().unwrap();
        player.quit();

        assert_eq!(player.state(), State::Quitting);
        assert!(!cfg.is_active());
        assert_eq!(
            changes.borrow()[2..],
            [
                (State::Playing, State::Ejected),
                (State::Ejected, State::Quitting),
            ]
        );
    }
}
