use std::fmt;

use log::Level;

use crate::command::Command;

/// Progress and error lines sent back over the serial link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ready {
        commands: Vec<Command>,
        empty_pass_limit: u32,
    },
    ReadyForNext,
    UnknownCommand,
    Scanning,
    ScanFailed(String),
    AlreadyHandled(/* device name */ String),
    HandlingNew(/* device name */ String),
    ConnectFailed(String),
    Connected,
    Writing,
    WritesDone,
    DeviceFailed(String),
    Disconnected,
    NoNewDevice { streak: u32, limit: u32 },
    Stopping { limit: u32 },
}

impl Status {
    pub fn level(&self) -> Level {
        match self {
            Status::UnknownCommand
            | Status::ScanFailed(_)
            | Status::ConnectFailed(_)
            | Status::DeviceFailed(_) => Level::Warn,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready {
                commands,
                empty_pass_limit,
            } => {
                let names = commands
                    .iter()
                    .map(Command::token)
                    .collect::<Vec<_>>()
                    .join(" or ");
                write!(
                    f,
                    "READY. Send {names} on UART to begin. Script stops after {empty_pass_limit} scans with no new devices."
                )
            }
            Status::ReadyForNext => f.write_str("READY for next command."),
            Status::UnknownCommand => f.write_str("ERR"),
            Status::Scanning => f.write_str("Scanning for BLE devices..."),
            Status::ScanFailed(err) => write!(f, "Scan error: {err}"),
            Status::AlreadyHandled(name) => write!(f, "Already handled {name}, skipping."),
            Status::HandlingNew(name) => write!(f, "Handling new device {name}"),
            Status::ConnectFailed(err) => write!(f, "Connect error: {err}"),
            Status::Connected => f.write_str("Connected."),
            Status::Writing => f.write_str("Writing..."),
            Status::WritesDone => f.write_str("Write(s) done"),
            Status::DeviceFailed(err) => write!(f, "Service/discovery/write failed: {err}"),
            Status::Disconnected => f.write_str("Disconnected."),
            Status::NoNewDevice { streak, limit } => write!(
                f,
                "No new device found. Consecutive unsuccessful scans: {streak}/{limit}"
            ),
            Status::Stopping { limit } => write!(
                f,
                "No new devices found after {limit} consecutive scans. Stopping."
            ),
        }
    }
}
