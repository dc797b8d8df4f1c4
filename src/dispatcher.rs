//! Reads command lines off the serial link and runs the scanner for each.

use log::{debug, info};
use tokio::time::sleep;

use crate::command::{Input, LineBuffer, parse_line};
use crate::config::DispatcherConfig;
use crate::messages::Status;
use crate::radio::Radio;
use crate::scanner::Scanner;
use crate::serial::{Reporter, SerialReporter, SerialTransport};

const READ_CHUNK: usize = 64;

pub struct Dispatcher<T, R> {
    transport: T,
    radio: R,
    scanner: Scanner,
    config: DispatcherConfig,
    buffer: LineBuffer,
}

impl<T, R> Dispatcher<T, R>
where
    T: SerialTransport,
    R: Radio,
{
    pub fn new(transport: T, radio: R, scanner: Scanner, config: DispatcherConfig) -> Self {
        Dispatcher {
            transport,
            radio,
            scanner,
            config,
            buffer: LineBuffer::new(),
        }
    }

    pub fn announce(&mut self) {
        let status = Status::Ready {
            commands: self.config.palette.commands().collect(),
            empty_pass_limit: self.scanner.config().empty_pass_limit,
        };
        SerialReporter::new(&mut self.transport).report(status);
    }

    /// Serve commands forever. Only a serial I/O failure ends the loop.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.announce();
        loop {
            self.poll().await?;
            sleep(self.config.idle_poll).await;
        }
    }

    /// Drain whatever input is pending, running the scanner for each complete
    /// command line. A run blocks further input until it finishes.
    pub async fn poll(&mut self) -> anyhow::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.transport.bytes_available()? > 0 {
            let n = self.transport.read_available(&mut chunk)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                if let Some(line) = self.buffer.push(byte) {
                    self.dispatch(&line).await;
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, line: &[u8]) {
        let command = match parse_line(line) {
            Input::Empty => return,
            Input::Unknown(token) => {
                debug!("Rejecting unknown command {token:?}");
                SerialReporter::new(&mut self.transport).report(Status::UnknownCommand);
                return;
            }
            Input::Command(command) => command,
        };
        let Some(payload) = self.config.palette.get(command).copied() else {
            debug!("No payload bound to {command}");
            SerialReporter::new(&mut self.transport).report(Status::UnknownCommand);
            return;
        };

        info!("Running {command} ({payload:?})");
        let mut reporter = SerialReporter::new(&mut self.transport);
        let summary = self
            .scanner
            .run(&payload, &mut self.radio, &mut reporter)
            .await;
        info!(
            "{command} finished: {} devices in {} passes",
            summary.handled.len(),
            summary.passes
        );
        reporter.report(Status::ReadyForNext);
    }

    #[cfg(test)]
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    #[cfg(test)]
    pub fn radio(&self) -> &R {
        &self.radio
    }
}
