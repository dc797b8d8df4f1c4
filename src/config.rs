use std::time::Duration;

use serde_derive::Deserialize;
use uuid::Uuid;

use crate::command::Palette;
use crate::radio::{NameMatcher, ScanParams};

/// GATT service exposing the light's control characteristic.
pub const TARGET_SERVICE_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0a0b0c0d1910);
/// Control characteristic the color packet is written to.
pub const TARGET_CHAR_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0a0b0c0d2b11);

/// Advertised name fragments of the supported light models.
pub const NAME_PATTERNS: [&str; 2] = ["ihoment_H6008", "Govee_H6001"];

pub const SCAN_DURATION: Duration = Duration::from_millis(5000);
pub const SCAN_INTERVAL_US: u32 = 30_000;
pub const SCAN_WINDOW_US: u32 = 30_000;

pub const WRITE_REPEAT: u32 = 3;
pub const WRITE_PAUSE: Duration = Duration::from_millis(200);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive passes without a new device before a run stops.
pub const EMPTY_PASS_LIMIT: u32 = 1;
pub const PASS_DELAY: Duration = Duration::from_secs(2);

pub const IDLE_POLL: Duration = Duration::from_millis(50);

pub const DEFAULT_SERIAL_PATH: &str = "/dev/serial0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Everything one scan run needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub matcher: NameMatcher,
    pub scan: ScanParams,
    pub write_repeat: u32,
    pub write_pause: Duration,
    pub connect_timeout: Duration,
    pub empty_pass_limit: u32,
    pub pass_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            service: TARGET_SERVICE_UUID,
            characteristic: TARGET_CHAR_UUID,
            matcher: NameMatcher::new(NAME_PATTERNS),
            scan: ScanParams {
                duration: SCAN_DURATION,
                interval_us: SCAN_INTERVAL_US,
                window_us: SCAN_WINDOW_US,
                active: true,
            },
            write_repeat: WRITE_REPEAT,
            write_pause: WRITE_PAUSE,
            connect_timeout: CONNECT_TIMEOUT,
            empty_pass_limit: EMPTY_PASS_LIMIT,
            pass_delay: PASS_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub palette: Palette,
    pub idle_poll: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            palette: Palette::default(),
            idle_poll: IDLE_POLL,
        }
    }
}

/// Deployment settings read from `config.toml`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub serial: Option<SerialConfig>,
    pub bluetooth: Option<BluetoothConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BluetoothConfig {
    /// Index into the adapter list reported by the platform.
    pub adapter: Option<usize>,
}

impl AppConfig {
    pub fn serial_path(&self) -> &str {
        self.serial
            .as_ref()
            .map(|s| s.path.as_str())
            .unwrap_or(DEFAULT_SERIAL_PATH)
    }

    pub fn baud_rate(&self) -> u32 {
        self.serial
            .as_ref()
            .and_then(|s| s.baud_rate)
            .unwrap_or(DEFAULT_BAUD_RATE)
    }

    pub fn adapter_index(&self) -> usize {
        self.bluetooth
            .as_ref()
            .and_then(|b| b.adapter)
            .unwrap_or(0)
    }
}
