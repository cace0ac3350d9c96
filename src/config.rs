//! Device configuration parameters
//!
//! All tunable timings for the communication core.  Every section has
//! `#[serde(default)]`, so a JSON file only needs the fields it overrides.

use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Top-level device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Character device used as the local transport.  `None` means
    /// stdin/stdout.
    pub serial_device: Option<String>,
    /// Directory for persisted settings.  `None` keeps settings in memory.
    pub settings_dir: Option<String>,
    pub rpc: RpcConfig,
    pub network: NetworkConfig,
    pub stream: StreamConfig,
}

/// Framing and transport parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Frame address carrying RPC packets.
    pub rpc_address: u8,
    /// Frame address carrying log records.
    pub log_address: u8,
    /// Read chunk size for the serial ingest loop.
    pub serial_read_chunk: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_address: crate::rpc::codec::RPC_ADDRESS,
            log_address: crate::rpc::codec::LOG_ADDRESS,
            serial_read_chunk: 64,
        }
    }
}

/// Wi-Fi attach and TCP listener parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP port the single-client RPC listener binds.
    pub port: u16,
    /// Pause between disassociate and associate (ms).
    pub disassociate_pause_ms: u64,
    /// Wait after a hard associate failure (ms).
    pub associate_backoff_ms: u64,
    /// Link-status polls per connect attempt.
    pub status_polls: u32,
    /// Delay between link-status polls (ms).
    pub status_poll_interval_ms: u64,
    /// Delay between IP-address polls (ms).
    pub ip_poll_interval_ms: u64,
    /// Progress log cadence while waiting for an address (polls).
    pub ip_progress_every: u32,
    /// Listener accept poll interval (ms).
    pub accept_poll_interval_ms: u64,
    /// Socket write timeout for the TCP client (ms).
    pub write_timeout_ms: u64,
    /// Give up after this many connect attempts.  `None` retries forever.
    pub max_connect_attempts: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 8888,
            disassociate_pause_ms: 1000,
            associate_backoff_ms: 2000,
            status_polls: 5,
            status_poll_interval_ms: 2000,
            ip_poll_interval_ms: 500,
            ip_progress_every: 10,
            accept_poll_interval_ms: 50,
            write_timeout_ms: 1000,
            max_connect_attempts: None,
        }
    }
}

impl NetworkConfig {
    pub fn disassociate_pause(&self) -> Duration {
        Duration::from_millis(self.disassociate_pause_ms)
    }

    pub fn associate_backoff(&self) -> Duration {
        Duration::from_millis(self.associate_backoff_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn ip_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ip_poll_interval_ms)
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Sensor sampling and stream push parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Minimum interval between two sensor fetches (ms).
    pub sensor_min_interval_ms: u64,
    /// Sleep between stream session cycles (ms).
    pub stream_period_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sensor_min_interval_ms: 2000,
            stream_period_ms: 2000,
        }
    }
}

impl StreamConfig {
    pub fn sensor_min_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_min_interval_ms)
    }

    pub fn stream_period(&self) -> Duration {
        Duration::from_millis(self.stream_period_ms)
    }
}
