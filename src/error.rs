//! Unified error types for the picolink communication core.
//!
//! Every subsystem has its own small `Copy` enum so it can be passed
//! across threads and stored in reports without allocation.  They all
//! convert into the top-level [`Error`], which the binary surfaces
//! through `anyhow`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Frame(FrameError),
    Transport(TransportError),
    Sensor(SensorError),
    Storage(StorageError),
    Settings(SettingsError),
    Connectivity(ConnectivityError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

/// Decoder-level failures.  Recovered locally by resynchronising on the
/// next flag byte; never surfaced to an RPC caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame check sequence mismatch, truncated frame, or aborted escape.
    Corrupt,
    /// Frame content exceeded the decoder buffer before a closing flag.
    Overflow,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt => write!(f, "corrupt frame"),
            Self::Overflow => write!(f, "frame exceeds decoder capacity"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No client socket is attached (TCP only).  Non-fatal.
    NotConnected,
    /// The underlying writer failed.
    Io(std::io::ErrorKind),
    /// The payload does not fit in a single frame.
    FrameTooLarge,
    /// The packet could not be serialised.
    Encode,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no client connected"),
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
            Self::FrameTooLarge => write!(f, "payload too large for one frame"),
            Self::Encode => write!(f, "packet encoding failed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sample fetch returned a driver error code.
    FetchFailed(i32),
    /// The device did not answer.
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed(rc) => write!(f, "sample fetch failed (rc={rc})"),
            Self::NotReady => write!(f, "sensor not ready"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Storage / settings errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Generic I/O error from the backend.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    InvalidSsid,
    InvalidPassword,
    Storage(StorageError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Storage(e) => write!(f, "could not persist: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<StorageError> for SettingsError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// The configured connect-attempt ceiling was reached.
    RetriesExhausted { attempts: u32 },
    /// The Wi-Fi link dropped while the listener was up.
    LinkLost,
    /// The TCP listener could not be bound.
    Bind(std::io::ErrorKind),
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted { attempts } => {
                write!(f, "Wi-Fi connect gave up after {attempts} attempts")
            }
            Self::LinkLost => write!(f, "Wi-Fi link lost"),
            Self::Bind(kind) => write!(f, "listener bind failed ({kind})"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Host client errors
// ---------------------------------------------------------------------------

/// Failures seen by [`RpcClient`](crate::client::RpcClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    Io(std::io::ErrorKind),
    /// The peer closed the stream.
    Closed,
    /// A request could not be encoded or framed.
    Encode,
    /// A reply body did not decode as the expected type.
    Decode,
    /// The device completed the call with a non-OK status.
    Status(crate::rpc::packet::Status),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
            Self::Closed => write!(f, "connection closed"),
            Self::Encode => write!(f, "request encoding failed"),
            Self::Decode => write!(f, "reply decoding failed"),
            Self::Status(s) => write!(f, "call failed: {s}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
