//! playoutd: a line-oriented audio player driven over stdin/stdout.
//!
//! Commands (`load`, `play`, `stop`, `seek`, `ejct`, `quit`) arrive one per
//! line on stdin; responses, state changes and position reports go to
//! stdout as `<CODE> <args...>` lines. Logs go to stderr.
//!
//! ## Threads
//! - a reader thread forwards stdin lines over a channel
//! - the main thread drains pending commands, updates the player (decode and
//!   ring-buffer top-up), then sleeps briefly
//! - the audio device thread runs the playout callback

mod cli;
mod command;
mod response;

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use tracing_subscriber::EnvFilter;

use playout::config::{LOOP_PERIOD, PlayoutConfig};
use playout::device;
use playout::error::PlayerError;
use playout::player::{Player, State};
use playout::system::{AudioSystem, Loader};

use command::Command;
use response::{MSG_OHAI, MSG_TTFN, Response, respond};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,playoutd=info,playout=info")
        }))
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        for (index, name) in device::list_devices(&host)?.iter().enumerate() {
            println!("{index}: {name}");
        }
        return Ok(());
    }

    let system = AudioSystem::new(args.device.as_deref(), args.sample_format, PlayoutConfig::default())
        .context("open audio system")?;

    let mut player = Player::new(system);
    register_listeners(&mut player, Duration::from_millis(args.position_period_ms));

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let lines = spawn_stdin_reader();

    respond(Response::Ohai, MSG_OHAI);
    run(&mut player, &lines, &interrupted);
    respond(Response::Ttfn, MSG_TTFN);
    Ok(())
}

/// Report state changes and positions on stdout.
fn register_listeners<L: Loader>(player: &mut Player<L>, period: Duration) {
    player.set_position_listener(
        period,
        Box::new(|position: Duration| respond(Response::Time, position.as_micros())),
    );
    player.set_state_listener(Box::new(|old: State, new: State| {
        respond(Response::Stat, format!("{old} {new}"))
    }));
}

/// Forward stdin lines until EOF; the channel disconnects when the reader exits.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            };
            if tx.send(line).is_err() {
                break;
            }
        }
        tracing::debug!("stdin reader exiting");
    });
    rx
}

fn run<L: Loader>(player: &mut Player<L>, lines: &Receiver<String>, interrupted: &AtomicBool) {
    while player.state() != State::Quitting {
        if interrupted.load(Ordering::SeqCst) {
            tracing::info!("interrupted; quitting");
            player.quit();
            break;
        }

        while player.state() != State::Quitting {
            match lines.try_recv() {
                Ok(line) => handle_line(player, &line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("stdin closed; quitting");
                    player.quit();
                }
            }
        }

        if let Err(e) = player.update() {
            respond(Response::Fail, e);
        }
        thread::sleep(LOOP_PERIOD);
    }
}

fn handle_line<L: Loader>(player: &mut Player<L>, line: &str) {
    let line = line.trim_end_matches('\r');
    tracing::debug!(line, "command");

    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(msg) => {
            respond(Response::What, msg);
            return;
        }
    };

    match command.execute(player) {
        Ok(()) => respond(Response::Okay, line),
        Err(e @ (PlayerError::BadState { .. } | PlayerError::BadCommand(_))) => {
            respond(Response::What, e)
        }
        Err(e @ PlayerError::Output(_)) => respond(Response::Fail, e),
    }
}
