// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::str::FromStr;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Event;
use crate::launcher::VoiceId;

const START: &str = "start";
const ONESHOT: &str = "oneshot";
const STOP: &str = "stop";
const STOPALL: &str = "stopall";
const VOLUME: &str = "volume";
const PLAY: &str = "play";
const PAUSE: &str = "pause";
const STATUS: &str = "status";
const QUIT: &str = "quit";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("Unrecognized command {0}")]
    Unrecognized(String),

    #[error("{command}: missing {what}")]
    Missing {
        command: &'static str,
        what: &'static str,
    },

    #[error("{command}: invalid {what} {value}")]
    Invalid {
        command: &'static str,
        what: &'static str,
        value: String,
    },

    #[error("{command}: unexpected argument {value}")]
    Unexpected { command: &'static str, value: String },
}

/// Parses one line of keyboard input. Blank lines parse to `None`.
pub fn parse_event(input: &str) -> Result<Option<Event>, ParseError> {
    let mut args = Args::new(input);
    let Some(command) = args.next() else {
        return Ok(None);
    };

    let event = match command.to_lowercase().as_str() {
        START => Event::Start {
            voice: args.required(START, "voice")?,
            clip: args.word(START, "clip")?,
            trigger: args.optional(START, "trigger")?,
        },
        ONESHOT => Event::OneShot {
            voice: args.required(ONESHOT, "voice")?,
            clip: args.word(ONESHOT, "clip")?,
            trigger: args.optional(ONESHOT, "trigger")?,
        },
        STOP => Event::Stop {
            voice: args.required(STOP, "voice")?,
            trigger: args.optional(STOP, "trigger")?,
        },
        STOPALL => Event::StopAll {
            trigger: args.optional(STOPALL, "trigger")?,
        },
        VOLUME => Event::Volume {
            voice: args.required::<VoiceId>(VOLUME, "voice")?,
            gain: args.required(VOLUME, "gain")?,
        },
        PLAY => Event::Play,
        PAUSE => Event::Pause,
        STATUS => Event::Status,
        QUIT => Event::Quit,
        _ => return Err(ParseError::Unrecognized(command.to_string())),
    };

    args.finish(command_name(&event))?;
    Ok(Some(event))
}

fn command_name(event: &Event) -> &'static str {
    match event {
        Event::Start { .. } => START,
        Event::OneShot { .. } => ONESHOT,
        Event::Stop { .. } => STOP,
        Event::StopAll { .. } => STOPALL,
        Event::Volume { .. } => VOLUME,
        Event::Play => PLAY,
        Event::Pause => PAUSE,
        Event::Status => STATUS,
        Event::Quit => QUIT,
    }
}

struct Args<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn new(input: &'a str) -> Args<'a> {
        Args {
            words: input.split_whitespace(),
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        self.words.next()
    }

    fn word(&mut self, command: &'static str, what: &'static str) -> Result<String, ParseError> {
        self.next()
            .map(str::to_string)
            .ok_or(ParseError::Missing { command, what })
    }

    fn required<T: FromStr>(
        &mut self,
        command: &'static str,
        what: &'static str,
    ) -> Result<T, ParseError> {
        self.optional(command, what)?
            .ok_or(ParseError::Missing { command, what })
    }

    fn optional<T: FromStr>(
        &mut self,
        command: &'static str,
        what: &'static str,
    ) -> Result<Option<T>, ParseError> {
        match self.next() {
            Some(value) => value.parse().map(Some).map_err(|_| ParseError::Invalid {
                command,
                what,
                value: value.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn finish(mut self, command: &'static str) -> Result<(), ParseError> {
        match self.next() {
            Some(value) => Err(ParseError::Unexpected {
                command,
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Reads commands from stdin, one per line.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and handles one line. Returns false once input is exhausted or the
    /// user quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <voice> <clip> [trigger], {} <voice> <clip> [trigger], \
             {} <voice> [trigger], {} [trigger], {} <voice> <gain>, {}, {}, {}, {}): ",
            START, ONESHOT, STOP, STOPALL, VOLUME, PLAY, PAUSE, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match parse_event(&input) {
            Ok(Some(event)) => {
                let quit = event == Event::Quit;
                events_tx.send(event).map_err(io::Error::other)?;
                Ok(!quit)
            }
            Ok(None) => Ok(true),
            Err(e) => {
                warn!(input = input.trim(), "{}", e);
                Ok(true)
            }
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
