//! Scan controller: repeated scan passes that push a color payload to every
//! matching light not yet handled in this run.

use std::collections::BTreeSet;

use log::{debug, warn};
use tokio::time::sleep;

use crate::config::ControllerConfig;
use crate::error::RadioError;
use crate::messages::Status;
use crate::payload::ColorPayload;
use crate::radio::{Device, Link, Radio, ScanSession, Sighting};
use crate::serial::Reporter;

/// Outcome of one run, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub handled: BTreeSet<String>,
    pub passes: u32,
}

pub struct Scanner {
    config: ControllerConfig,
}

impl Scanner {
    pub fn new(config: ControllerConfig) -> Self {
        Scanner { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Scan until `empty_pass_limit` consecutive passes find no new device.
    pub async fn run<R, P>(
        &self,
        payload: &ColorPayload,
        radio: &mut R,
        reporter: &mut P,
    ) -> RunSummary
    where
        R: Radio,
        P: Reporter,
    {
        let limit = self.config.empty_pass_limit;
        let mut summary = RunSummary::default();
        let mut empty_streak = 0;

        while empty_streak < limit {
            reporter.report(Status::Scanning);
            summary.passes += 1;

            let found_new = self
                .scan_pass(payload, radio, reporter, &mut summary.handled)
                .await;

            if found_new {
                empty_streak = 0;
            } else {
                empty_streak += 1;
                reporter.report(Status::NoNewDevice {
                    streak: empty_streak,
                    limit,
                });
            }

            sleep(self.config.pass_delay).await;
        }

        reporter.report(Status::Stopping { limit });
        debug!(
            "Run finished after {} passes, {} devices handled",
            summary.passes,
            summary.handled.len()
        );
        summary
    }

    /// One scan session. Returns whether any new device was written.
    async fn scan_pass<R, P>(
        &self,
        payload: &ColorPayload,
        radio: &mut R,
        reporter: &mut P,
        handled: &mut BTreeSet<String>,
    ) -> bool
    where
        R: Radio,
        P: Reporter,
    {
        let mut session = match radio.scan(&self.config.scan).await {
            Ok(session) => session,
            Err(err) => {
                reporter.report(Status::ScanFailed(err.to_string()));
                return false;
            }
        };

        let mut found_new = false;
        while let Some(Sighting { name, device }) = session.next().await {
            let Some(name) = name.filter(|n| self.config.matcher.matches(n)) else {
                continue;
            };
            if handled.contains(&name) {
                reporter.report(Status::AlreadyHandled(name));
                continue;
            }

            reporter.report(Status::HandlingNew(name.clone()));
            if self.handle_device(device, payload, reporter).await {
                handled.insert(name);
                found_new = true;
            }
        }

        session.close().await;
        found_new
    }

    /// Connect, write and always disconnect. Returns true only if every write
    /// went out.
    async fn handle_device<D, P>(&self, device: D, payload: &ColorPayload, reporter: &mut P) -> bool
    where
        D: Device,
        P: Reporter,
    {
        let mut link = match device.connect(self.config.connect_timeout).await {
            Ok(link) => link,
            Err(err) => {
                reporter.report(Status::ConnectFailed(err.to_string()));
                return false;
            }
        };
        reporter.report(Status::Connected);

        let written = self.write_payload(&mut link, payload, reporter).await;
        match &written {
            Ok(()) => reporter.report(Status::WritesDone),
            Err(err) => reporter.report(Status::DeviceFailed(err.to_string())),
        }

        if let Err(err) = link.disconnect().await {
            warn!("Error disconnecting: {err}");
        }
        reporter.report(Status::Disconnected);

        written.is_ok()
    }

    async fn write_payload<L, P>(
        &self,
        link: &mut L,
        payload: &ColorPayload,
        reporter: &mut P,
    ) -> Result<(), RadioError>
    where
        L: Link,
        P: Reporter,
    {
        let service = link.service(self.config.service).await?;
        let characteristic = link
            .characteristic(&service, self.config.characteristic)
            .await?;

        reporter.report(Status::Writing);
        for attempt in 1..=self.config.write_repeat {
            link.write(&characteristic, payload.as_bytes()).await?;
            debug!("Write {attempt}/{} sent", self.config.write_repeat);
            sleep(self.config.write_pause).await;
        }
        Ok(())
    }
}
