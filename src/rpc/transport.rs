//! Transport abstraction: ordered, reliable byte sinks.
//!
//! Concrete implementations:
//! - [`SerialTransport`]: USB-CDC / UART character device (always attached)
//! - [`TcpTransport`]: the single Wi-Fi TCP client (attached only while a
//!   client socket is open)
//!
//! Transports only cover the write direction.  Each ingest loop owns its
//! own reader; replies and logs are written through
//! [`OutputFanout`](super::fanout::OutputFanout), which owns the
//! transports.

use core::fmt;
use std::io::Write;

use crate::error::TransportError;

/// Logical link a request arrived on and a reply goes back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Serial,
    Tcp,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// Byte-oriented output channel.
pub trait Transport: Send {
    /// Which link this transport serves.
    fn link(&self) -> Link;

    /// Whether writes can currently succeed.
    fn is_attached(&self) -> bool;

    /// Write every byte of `data`, in order.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;
}

/// Boxed writer half of a byte stream.
pub type ByteSink = Box<dyn Write + Send>;

// ───────────────────────────────────────────────────────────────
// Serial
// ───────────────────────────────────────────────────────────────

/// Local character-device transport.
pub struct SerialTransport {
    writer: ByteSink,
}

impl SerialTransport {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }
}

impl Transport for SerialTransport {
    fn link(&self) -> Link {
        Link::Serial
    }

    fn is_attached(&self) -> bool {
        true
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(data).map_err(TransportError::from)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush().map_err(TransportError::from)
    }
}

// ───────────────────────────────────────────────────────────────
// TCP
// ───────────────────────────────────────────────────────────────

/// Wi-Fi TCP client transport.
///
/// Holds the write half of the currently accepted client, if any.  With
/// no client attached every write fails with
/// [`TransportError::NotConnected`]; callers treat that as non-fatal.
///
/// Every attach starts a new connection number, so state tied to one
/// client can tell when a different client has taken the link.
#[derive(Default)]
pub struct TcpTransport {
    client: Option<ByteSink>,
    connection: u64,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the write half of a freshly accepted client and return its
    /// connection number.
    pub fn attach(&mut self, writer: ByteSink) -> u64 {
        self.connection = self.connection.wrapping_add(1);
        self.client = Some(writer);
        self.connection
    }

    /// Number of the most recent attach; `0` before the first client.
    pub fn connection(&self) -> u64 {
        self.connection
    }

    /// Drop the client writer.  Returns `true` if one was attached.
    pub fn detach(&mut self) -> bool {
        self.client.take().is_some()
    }
}

impl Transport for TcpTransport {
    fn link(&self) -> Link {
        Link::Tcp
    }

    fn is_attached(&self) -> bool {
        self.client.is_some()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client.write_all(data).map_err(TransportError::from)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client.flush().map_err(TransportError::from)
    }
}
