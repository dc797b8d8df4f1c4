use std::io::{self, Read as _, Write as _};
use std::time::Duration;

use anyhow::Context as _;
use log::{error, log};
use serialport::SerialPort;

use crate::messages::Status;

/// Byte-level access to the command link.
pub trait SerialTransport {
    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

pub fn open(path: &str, baud_rate: u32) -> anyhow::Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .timeout(Duration::from_millis(10))
        .open()
        .with_context(|| format!("Could not open serial port {path} at {baud_rate} baud"))
}

impl SerialTransport for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }
}

/// Sink for status lines.
pub trait Reporter {
    fn report(&mut self, status: Status);
}

/// Mirrors every status to the log and writes it as a CRLF line on the link.
pub struct SerialReporter<'a, T: SerialTransport> {
    transport: &'a mut T,
}

impl<'a, T: SerialTransport> SerialReporter<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        SerialReporter { transport }
    }
}

impl<T: SerialTransport> Reporter for SerialReporter<'_, T> {
    fn report(&mut self, status: Status) {
        log!(status.level(), "{status}");
        let line = format!("{status}\r\n");
        if let Err(err) = self.transport.send(line.as_bytes()) {
            error!("Error writing status to serial: {err}");
        }
    }
}
