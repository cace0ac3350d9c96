//! Wi-Fi settings: loaded once at boot, updated through `ConfigureWifi`.
//!
//! [`Settings`] is an explicit object shared (via `Arc`) by the device
//! service and the network attachment.  Connect attempts take a snapshot
//! with [`Settings::credentials`]; an update is only visible to the next
//! attempt.
//!
//! Persisted keys: `wifi/ssid`, `wifi/password`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use heapless::String;
use log::{info, warn};

use crate::app::messages::{PASSWORD_LEN, SSID_LEN};
use crate::app::ports::SettingsStore;
use crate::error::SettingsError;

pub const SSID_KEY: &str = "wifi/ssid";
pub const PASSWORD_KEY: &str = "wifi/password";

const DEFAULT_SSID: &str = "YOURSSID";
const DEFAULT_PASSWORD: &str = "YOURPASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String<SSID_LEN>,
    pub password: String<PASSWORD_LEN>,
}

impl core::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WifiCredentials {
    /// Validated constructor.
    pub fn new(ssid: &str, password: &str) -> Result<Self, SettingsError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: String::try_from(ssid).map_err(|()| SettingsError::InvalidSsid)?,
            password: String::try_from(password).map_err(|()| SettingsError::InvalidPassword)?,
        })
    }
}

impl Default for WifiCredentials {
    fn default() -> Self {
        Self {
            ssid: String::try_from(DEFAULT_SSID).unwrap_or_default(),
            password: String::try_from(DEFAULT_PASSWORD).unwrap_or_default(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), SettingsError> {
    if ssid.is_empty() || ssid.len() > SSID_LEN || !is_printable_ascii(ssid) {
        return Err(SettingsError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), SettingsError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > PASSWORD_LEN {
        return Err(SettingsError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Settings
// ───────────────────────────────────────────────────────────────

pub struct Settings {
    credentials: Mutex<WifiCredentials>,
    store: Mutex<Box<dyn SettingsStore>>,
}

impl Settings {
    /// Load persisted credentials from `store`, falling back to the
    /// built-in defaults for anything missing or unreadable.
    pub fn load(store: Box<dyn SettingsStore>) -> Self {
        let mut credentials = WifiCredentials::default();
        if let Some(ssid) = load_string::<SSID_LEN>(store.as_ref(), SSID_KEY) {
            info!("Settings: loaded Wi-Fi SSID");
            credentials.ssid = ssid;
        }
        if let Some(password) = load_string::<PASSWORD_LEN>(store.as_ref(), PASSWORD_KEY) {
            info!("Settings: loaded Wi-Fi password");
            credentials.password = password;
        }
        Self {
            credentials: Mutex::new(credentials),
            store: Mutex::new(store),
        }
    }

    /// Snapshot of the live credentials.
    pub fn credentials(&self) -> WifiCredentials {
        lock(&self.credentials).clone()
    }

    /// Validate, persist, then publish new credentials.
    ///
    /// On any error the live credentials are unchanged.
    pub fn configure_wifi(&self, ssid: &str, password: &str) -> Result<(), SettingsError> {
        let next = WifiCredentials::new(ssid, password)?;
        {
            let mut store = lock(&self.store);
            store.save(SSID_KEY, next.ssid.as_bytes())?;
            store.save(PASSWORD_KEY, next.password.as_bytes())?;
        }
        *lock(&self.credentials) = next;
        info!("Settings: Wi-Fi configured (SSID='{ssid}')");
        Ok(())
    }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read `key` as a string, tolerating a trailing NUL terminator.
fn load_string<const N: usize>(store: &dyn SettingsStore, key: &str) -> Option<String<N>> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Settings: reading {key} failed: {e}");
            return None;
        }
    };
    let trimmed = raw.split(|&b| b == 0).next().unwrap_or_default();
    let parsed = core::str::from_utf8(trimmed)
        .ok()
        .and_then(|s| String::try_from(s).ok());
    if parsed.is_none() {
        warn!("Settings: stored {key} is not a valid string, ignoring");
    }
    parsed
}
