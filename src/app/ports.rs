//! Port traits: the boundary between the communication core and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceService / NetworkAttachment
//! ```
//!
//! Driven adapters (sensor, settings storage, Wi-Fi radio) implement these
//! traits.  The LED uses `embedded_hal::digital::OutputPin` directly, so
//! any HAL pin plugs in unchanged.  Host simulations live in
//! [`crate::adapters`].

use std::net::Ipv4Addr;

use crate::error::{SensorError, StorageError};
use crate::settings::WifiCredentials;

// ───────────────────────────────────────────────────────────────
// Sensor port
// ───────────────────────────────────────────────────────────────

/// One temperature / humidity sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Read-side port for the ambient sensor.
///
/// Implementations perform a full sample fetch on every call; pacing is
/// the caller's job (see [`RateLimitedSensor`](super::sampler::RateLimitedSensor)).
pub trait SensorSource: Send {
    fn read(&mut self) -> Result<SensorReading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Settings storage port
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.  Keys are `subsystem/name` paths.
pub trait SettingsStore: Send {
    /// Read a value.  `Ok(None)` if the key was never written.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a value, replacing any previous one.
    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi driver port
// ───────────────────────────────────────────────────────────────

/// Association state as reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Scanning,
    Authenticating,
    Associating,
    /// Associated (and handshake complete).
    Associated,
}

/// Why an association request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociateError {
    /// A request is already in flight; keep polling link state.
    InProgress,
    /// The radio rejected the request with a driver code.
    Failed(i32),
}

impl core::fmt::Display for AssociateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InProgress => write!(f, "request already in progress"),
            Self::Failed(rc) => write!(f, "ret={rc}"),
        }
    }
}

/// Station-mode radio control.
pub trait WifiDriver: Send {
    /// Drop any current association.  Never fails.
    fn disassociate(&mut self);

    /// Request association with `credentials`.
    fn associate(&mut self, credentials: &WifiCredentials) -> Result<(), AssociateError>;

    fn link_state(&self) -> LinkState;

    /// Global IPv4 address, once DHCP has assigned one.
    fn ipv4_address(&self) -> Option<Ipv4Addr>;
}
