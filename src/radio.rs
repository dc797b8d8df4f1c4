//! The wireless capability the scanner drives.
//!
//! A [`Radio`] opens bounded scan sessions; each session yields [`Sighting`]s
//! in arrival order. A sighting's [`Device`] can be connected to, giving a
//! [`Link`] through which the target characteristic is resolved and written.
//!
//! Implementations release resources on drop as a fallback, but callers are
//! expected to `close`/`disconnect` explicitly on every path.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt as _};
use log::debug;
use tokio::time::{Instant, timeout, timeout_at};
use uuid::Uuid;

use crate::error::RadioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// How long a session keeps delivering sightings.
    pub duration: Duration,
    pub interval_us: u32,
    pub window_us: u32,
    pub active: bool,
}

/// One advertisement observed during a scan session.
pub struct Sighting<D> {
    pub name: Option<String>,
    pub device: D,
}

#[async_trait]
pub trait Radio: Send {
    type Session: ScanSession;

    async fn scan(&mut self, params: &ScanParams) -> Result<Self::Session, RadioError>;
}

#[async_trait]
pub trait ScanSession: Send {
    type Device: Device;

    /// Next sighting, or `None` once the session window has elapsed.
    async fn next(&mut self) -> Option<Sighting<Self::Device>>;

    /// Stop scanning. Further calls to `next` return `None`.
    async fn close(&mut self);
}

#[async_trait]
pub trait Device: Send {
    type Link: Link;

    /// Connect, giving up after `limit`. An abandoned attempt must not leave
    /// the peripheral connected.
    async fn connect(self, limit: Duration) -> Result<Self::Link, RadioError>;
}

#[async_trait]
pub trait Link: Send {
    type Service: Send + Sync;
    type Characteristic: Send + Sync;

    async fn service(&mut self, id: Uuid) -> Result<Self::Service, RadioError>;

    async fn characteristic(
        &mut self,
        service: &Self::Service,
        id: Uuid,
    ) -> Result<Self::Characteristic, RadioError>;

    async fn write(
        &mut self,
        characteristic: &Self::Characteristic,
        payload: &[u8],
    ) -> Result<(), RadioError>;

    async fn disconnect(&mut self) -> Result<(), RadioError>;
}

/// Next item from `stream`, or `None` once `deadline` has passed, even if
/// items are still queued.
pub async fn next_before<S>(stream: &mut S, deadline: Instant) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    if Instant::now() >= deadline {
        return None;
    }
    timeout_at(deadline, stream.next()).await.ok().flatten()
}

/// Run `attempt` for at most `limit`. On timeout, `abort` tears down whatever
/// the attempt may still bring up.
pub async fn connect_within<T, C, A>(limit: Duration, attempt: C, abort: A) -> Result<T, RadioError>
where
    C: Future<Output = Result<T, RadioError>>,
    A: Future<Output = Result<(), RadioError>>,
{
    match timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => {
            if let Err(err) = abort.await {
                debug!("Error aborting connect: {err}");
            }
            Err(RadioError::Timeout(limit))
        }
    }
}

/// Accepts advertised names containing any of the configured patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    patterns: Vec<String>,
}

impl NameMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameMatcher {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| name.contains(p.as_str()))
    }
}
