use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::payload::{self, ColorPayload};

/// Longest command line kept; later bytes on the same line are dropped.
pub const MAX_LINE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Command {
    White,
    Pink,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::White, Command::Pink];

    /// Wire token, as typed on the serial link.
    pub fn token(&self) -> &'static str {
        match self {
            Command::White => "WHITE",
            Command::Pink => "PINK",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Expects an already normalized (trimmed, upper-case) token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.token() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Payload bound to each command.
#[derive(Debug, Clone)]
pub struct Palette(BTreeMap<Command, ColorPayload>);

impl Palette {
    pub fn new(entries: impl IntoIterator<Item = (Command, ColorPayload)>) -> Self {
        Palette(entries.into_iter().collect())
    }

    pub fn get(&self, command: Command) -> Option<&ColorPayload> {
        self.0.get(&command)
    }

    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.0.keys().copied()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new([
            (Command::White, payload::WHITE),
            (Command::Pink, payload::PINK),
        ])
    }
}

/// One complete line read from the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(Command),
    Unknown(String),
}

pub fn parse_line(line: &[u8]) -> Input {
    let token = String::from_utf8_lossy(line.trim_ascii()).to_ascii_uppercase();
    if token.is_empty() {
        return Input::Empty;
    }
    match token.parse() {
        Ok(command) => Input::Command(command),
        Err(UnknownCommand(token)) => Input::Unknown(token),
    }
}

/// Accumulates bytes until a `\r` or `\n` terminator.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer::default()
    }

    /// Feed one byte; returns the finished line when `byte` terminates it.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        match byte {
            b'\r' | b'\n' => Some(std::mem::take(&mut self.buf)),
            _ => {
                if self.buf.len() < MAX_LINE_LEN {
                    self.buf.push(byte);
                }
                None
            }
        }
    }
}
