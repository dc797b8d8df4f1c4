use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failure talking to a single peripheral, or to the adapter while scanning.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error(transparent)]
    Bluetooth(#[from] btleplug::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
}
