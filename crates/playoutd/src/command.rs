//! Command words read from stdin.
//!
//! A line is split into words on spaces. Double quotes group words
//! containing spaces, and a backslash escapes the next character (`\n` is a
//! newline).

use playout::error::PlayerError;
use playout::player::Player;
use playout::system::Loader;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Play,
    Stop,
    Eject,
    Quit,
    Load(String),
    Seek(String),
}

impl Command {
    /// Parse a full command line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let words = tokenize(line)?;
        let (name, args) = words.split_first().ok_or("empty command")?;
        let arg = || match args {
            [word] if !word.is_empty() => Ok(word.clone()),
            _ => Err(format!("{name} takes exactly one argument")),
        };
        let bare = |command: Command| {
            if args.is_empty() {
                Ok(command)
            } else {
                Err(format!("{name} takes no arguments"))
            }
        };

        match name.as_str() {
            "play" => bare(Command::Play),
            "stop" => bare(Command::Stop),
            "ejct" => bare(Command::Eject),
            "quit" => bare(Command::Quit),
            "load" => arg().map(Command::Load),
            "seek" => arg().map(Command::Seek),
            other => Err(format!("unknown command: {other}")),
        }
    }

    /// Run the command against `player`.
    pub fn execute<L: Loader>(&self, player: &mut Player<L>) -> Result<(), PlayerError> {
        match self {
            Command::Play => player.play(),
            Command::Stop => player.stop(),
            Command::Eject => player.eject(),
            Command::Quit => {
                player.quit();
                Ok(())
            }
            Command::Load(path) => player.load(path),
            Command::Seek(time) => player.seek(time),
        }
    }
}

/// Split `line` into words.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    // A quoted word counts even when empty.
    let mut started = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or("dangling escape at end of line")?;
                word.push(if escaped == 'n' { '\n' } else { escaped });
                started = true;
            }
            '"' => {
                quoted = !quoted;
                started = true;
            }
            ' ' if !quoted => {
                if started {
                    words.push(std::mem::take(&mut word));
                    started = false;
                }
            }
            c => {
                word.push(c);
                started = true;
            }
        }
    }

    if quoted {
        return Err("unterminated quote".to_string());
    }
    if started {
        words.push(word);
    }
    Ok(words)
}
