//! btleplug backed implementation of the radio traits.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    Service, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, TryFutureExt as _};
use log::{debug, warn};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::RadioError;
use crate::radio::{
    Device, Link, Radio, ScanParams, ScanSession, Sighting, connect_within, next_before,
};

type EventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

pub struct BtleRadio {
    adapter: Adapter,
}

impl BtleRadio {
    /// Open the platform manager and take the adapter at `index`.
    pub async fn open(index: usize) -> anyhow::Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let count = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("no bluetooth adapter at index {index} ({count} found)"))?;
        debug!("Using adapter {:?}", adapter.adapter_info().await);
        Ok(BtleRadio { adapter })
    }
}

#[async_trait]
impl Radio for BtleRadio {
    type Session = BtleScan;

    async fn scan(&mut self, params: &ScanParams) -> Result<BtleScan, RadioError> {
        // BlueZ picks its own interval/window and always scans actively.
        debug!(
            "Starting scan for {:?} (interval {}us, window {}us, active {})",
            params.duration, params.interval_us, params.window_us, params.active
        );
        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        Ok(BtleScan {
            adapter: self.adapter.clone(),
            events,
            deadline: Instant::now() + params.duration,
            scanning: true,
        })
    }
}

/// A running scan. Dropping it without `close` stops the scan in the
/// background.
pub struct BtleScan {
    adapter: Adapter,
    events: EventStream,
    deadline: Instant,
    scanning: bool,
}

#[async_trait]
impl ScanSession for BtleScan {
    type Device = BtleDevice;

    async fn next(&mut self) -> Option<Sighting<BtleDevice>> {
        if !self.scanning {
            return None;
        }
        loop {
            // Events queue up while a device is being handled; the window
            // still ends on time.
            let event = next_before(&mut self.events, self.deadline).await?;

            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };

            let peripheral = match self.adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral,
                Err(err) => {
                    debug!("Lost peripheral {id:?}: {err}");
                    continue;
                }
            };
            let name = match peripheral.properties().await {
                Ok(properties) => properties.and_then(|p| p.local_name),
                Err(err) => {
                    debug!("No properties for {id:?}: {err}");
                    None
                }
            };

            return Some(Sighting {
                name,
                device: BtleDevice { peripheral },
            });
        }
    }

    async fn close(&mut self) {
        if !self.scanning {
            return;
        }
        self.scanning = false;
        if let Err(err) = self.adapter.stop_scan().await {
            warn!("Error stopping scan: {err}");
        }
    }
}

impl Drop for BtleScan {
    fn drop(&mut self) {
        if !self.scanning {
            return;
        }
        let adapter = self.adapter.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = adapter.stop_scan().await {
                    warn!("Error stopping abandoned scan: {err}");
                }
            });
        }
    }
}

pub struct BtleDevice {
    peripheral: Peripheral,
}

#[async_trait]
impl Device for BtleDevice {
    type Link = BtleLink;

    async fn connect(self, limit: Duration) -> Result<BtleLink, RadioError> {
        if !self.peripheral.is_connected().await? {
            // BlueZ keeps connecting after the call is dropped, so a timed
            // out attempt is torn down explicitly.
            connect_within(
                limit,
                self.peripheral.connect().map_err(RadioError::from),
                self.peripheral.disconnect().map_err(RadioError::from),
            )
            .await?;
        }
        Ok(BtleLink {
            peripheral: self.peripheral,
            discovered: false,
            connected: true,
        })
    }
}

/// An open connection. Dropping it while connected disconnects in the
/// background.
pub struct BtleLink {
    peripheral: Peripheral,
    discovered: bool,
    connected: bool,
}

#[async_trait]
impl Link for BtleLink {
    type Service = Service;
    type Characteristic = Characteristic;

    async fn service(&mut self, id: Uuid) -> Result<Service, RadioError> {
        if !self.discovered {
            self.peripheral.discover_services().await?;
            self.discovered = true;
        }
        self.peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == id)
            .ok_or(RadioError::ServiceNotFound(id))
    }

    async fn characteristic(
        &mut self,
        service: &Service,
        id: Uuid,
    ) -> Result<Characteristic, RadioError> {
        service
            .characteristics
            .iter()
            .find(|c| c.uuid == id)
            .cloned()
            .ok_or(RadioError::CharacteristicNotFound(id))
    }

    async fn write(
        &mut self,
        characteristic: &Characteristic,
        payload: &[u8],
    ) -> Result<(), RadioError> {
        self.peripheral
            .write(characteristic, payload, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RadioError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Drop for BtleLink {
    fn drop(&mut self) {
        if !self.connected {
            return;
        }
        let peripheral = self.peripheral.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = peripheral.disconnect().await {
                    warn!("Error disconnecting abandoned link: {err}");
                }
            });
        }
    }
}
