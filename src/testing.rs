//! In-memory radio, transport and reporter for unit tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt as _};
use tokio::time::{Instant, sleep};
use uuid::Uuid;

use crate::error::RadioError;
use crate::messages::Status;
use crate::radio::{
    Device, Link, Radio, ScanParams, ScanSession, Sighting, connect_within, next_before,
};
use crate::serial::{Reporter, SerialTransport};

/// How a mock device reacts once the scanner reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    ConnectFails,
    /// The link comes up on the radio side, but the connect call never
    /// returns.
    ConnectHangs,
    ServiceMissing,
    CharacteristicMissing,
    /// The n-th write (1-based) is rejected.
    WriteFailsAt(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ScanOpened,
    ScanClosed,
    ConnectAttempt(String),
    Connected(String),
    Write(String, Vec<u8>),
    Disconnected(String),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<(Instant, Event)>>>);

impl EventLog {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push((Instant::now(), event));
    }

    pub fn events(&self) -> Vec<(Instant, Event)> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|(_, e)| pred(e)).count()
    }

    pub fn scans_opened(&self) -> usize {
        self.count(|e| *e == Event::ScanOpened)
    }

    pub fn connects(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                Event::ConnectAttempt(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, device: &str) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                Event::Write(name, bytes) if name == device => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// Every scan was stopped and every established link torn down.
    pub fn assert_released(&self) {
        assert_eq!(
            self.scans_opened(),
            self.count(|e| *e == Event::ScanClosed),
            "scan session left open"
        );
        assert_eq!(
            self.count(|e| matches!(e, Event::Connected(_))),
            self.count(|e| matches!(e, Event::Disconnected(_))),
            "link left connected"
        );
    }
}

struct MockSighting {
    name: Option<String>,
    behavior: Behavior,
    /// Silence before this advertisement, counted from the previous one.
    delay: Duration,
}

/// Serves one scripted list of sightings per scan pass; passes beyond the
/// script see nothing.
pub struct MockRadio {
    passes: VecDeque<Vec<MockSighting>>,
    log: EventLog,
    fail_next_scan: bool,
}

impl MockRadio {
    pub fn new(passes: Vec<Vec<(&str, Behavior)>>) -> Self {
        MockRadio {
            passes: passes
                .into_iter()
                .map(|pass| {
                    pass.into_iter()
                        .map(|(name, behavior)| MockSighting {
                            name: Some(name.to_string()),
                            behavior,
                            delay: Duration::ZERO,
                        })
                        .collect()
                })
                .collect(),
            log: EventLog::default(),
            fail_next_scan: false,
        }
    }

    /// Append an advertisement without a name to pass `pass`.
    pub fn push_nameless(&mut self, pass: usize) {
        self.passes[pass].push(MockSighting {
            name: None,
            behavior: Behavior::Ok,
            delay: Duration::ZERO,
        });
    }

    /// Append an advertisement to pass `pass` that arrives `delay` after the
    /// one before it.
    pub fn push_delayed(&mut self, pass: usize, name: &str, delay: Duration, behavior: Behavior) {
        self.passes[pass].push(MockSighting {
            name: Some(name.to_string()),
            behavior,
            delay,
        });
    }

    pub fn fail_next_scan(&mut self) {
        self.fail_next_scan = true;
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

#[async_trait]
impl Radio for MockRadio {
    type Session = MockSession;

    async fn scan(&mut self, params: &ScanParams) -> Result<MockSession, RadioError> {
        if std::mem::take(&mut self.fail_next_scan) {
            return Err(RadioError::Bluetooth(btleplug::Error::Other(
                "adapter busy".into(),
            )));
        }
        self.log.push(Event::ScanOpened);
        let sightings = futures::stream::iter(self.passes.pop_front().unwrap_or_default())
            .then(|sighting| async move {
                sleep(sighting.delay).await;
                sighting
            })
            .boxed();
        Ok(MockSession {
            sightings,
            deadline: Instant::now() + params.duration,
            log: self.log.clone(),
            open: true,
        })
    }
}

pub struct MockSession {
    sightings: Pin<Box<dyn Stream<Item = MockSighting> + Send>>,
    deadline: Instant,
    log: EventLog,
    open: bool,
}

#[async_trait]
impl ScanSession for MockSession {
    type Device = MockDevice;

    async fn next(&mut self) -> Option<Sighting<MockDevice>> {
        if !self.open {
            return None;
        }
        let sighting = next_before(&mut self.sightings, self.deadline).await?;
        Some(Sighting {
            name: sighting.name.clone(),
            device: MockDevice {
                name: sighting.name.unwrap_or_default(),
                behavior: sighting.behavior,
                log: self.log.clone(),
            },
        })
    }

    async fn close(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.log.push(Event::ScanClosed);
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if self.open {
            self.log.push(Event::ScanClosed);
        }
    }
}

pub struct MockDevice {
    name: String,
    behavior: Behavior,
    log: EventLog,
}

#[async_trait]
impl Device for MockDevice {
    type Link = MockLink;

    async fn connect(self, limit: Duration) -> Result<MockLink, RadioError> {
        self.log.push(Event::ConnectAttempt(self.name.clone()));
        if self.behavior == Behavior::ConnectFails {
            return Err(RadioError::Bluetooth(btleplug::Error::Other(
                "connection refused".into(),
            )));
        }

        let hangs = self.behavior == Behavior::ConnectHangs;
        if hangs {
            self.log.push(Event::Connected(self.name.clone()));
        }
        let attempt = async move {
            if hangs {
                futures::future::pending::<()>().await;
            }
            Ok::<_, RadioError>(())
        };
        let (log, name) = (self.log.clone(), self.name.clone());
        let abort = async move {
            log.push(Event::Disconnected(name));
            Ok::<_, RadioError>(())
        };
        connect_within(limit, attempt, abort).await?;

        self.log.push(Event::Connected(self.name.clone()));
        Ok(MockLink {
            name: self.name,
            behavior: self.behavior,
            log: self.log,
            writes: 0,
            connected: true,
        })
    }
}

pub struct MockLink {
    name: String,
    behavior: Behavior,
    log: EventLog,
    writes: u32,
    connected: bool,
}

#[async_trait]
impl Link for MockLink {
    type Service = Uuid;
    type Characteristic = Uuid;

    async fn service(&mut self, id: Uuid) -> Result<Uuid, RadioError> {
        match self.behavior {
            Behavior::ServiceMissing => Err(RadioError::ServiceNotFound(id)),
            _ => Ok(id),
        }
    }

    async fn characteristic(&mut self, _service: &Uuid, id: Uuid) -> Result<Uuid, RadioError> {
        match self.behavior {
            Behavior::CharacteristicMissing => Err(RadioError::CharacteristicNotFound(id)),
            _ => Ok(id),
        }
    }

    async fn write(&mut self, _characteristic: &Uuid, payload: &[u8]) -> Result<(), RadioError> {
        self.writes += 1;
        if self.behavior == Behavior::WriteFailsAt(self.writes) {
            return Err(RadioError::Bluetooth(btleplug::Error::Other(
                "write rejected".into(),
            )));
        }
        self.log
            .push(Event::Write(self.name.clone(), payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        if std::mem::replace(&mut self.connected, false) {
            self.log.push(Event::Disconnected(self.name.clone()));
        }
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if self.connected {
            self.log.push(Event::Disconnected(self.name.clone()));
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub statuses: Vec<Status>,
}

impl Reporter for RecordingReporter {
    fn report(&mut self, status: Status) {
        self.statuses.push(status);
    }
}

/// Serial link backed by byte queues.
#[derive(Debug, Default)]
pub struct FakeTransport {
    input: VecDeque<u8>,
    scheduled: Vec<(Instant, Vec<u8>)>,
    output: Vec<u8>,
}

impl FakeTransport {
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut transport = FakeTransport::default();
        transport.feed(bytes);
        transport
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Make `bytes` readable once `delay` has elapsed.
    pub fn feed_after(&mut self, delay: Duration, bytes: &[u8]) {
        self.scheduled.push((Instant::now() + delay, bytes.to_vec()));
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.output_text()
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl SerialTransport for FakeTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let now = Instant::now();
        let (due, later) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition::<Vec<_>, _>(|(at, _)| *at <= now);
        self.scheduled = later;
        for (_, bytes) in due {
            self.input.extend(bytes);
        }
        Ok(self.input.len())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}
