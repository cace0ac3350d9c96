//! Thread-safe output path shared by every frame producer.
//!
//! ```text
//!  serial ingest ─┐
//!  rpc-net ───────┼──▶ OutputFanout ──▶ [ SerialTransport | TcpTransport ]
//!  sensor-stream ─┤     (one Mutex)
//!  log sink ──────┘
//! ```
//!
//! A frame is encoded before the lock is taken; the lock is then held for
//! exactly one frame's write + flush, so frames from concurrent producers
//! never interleave on the wire.  The active-transport set (is a TCP
//! client attached?) lives behind the same lock.
//!
//! A TCP write that fails with an I/O error detaches the client in the
//! same lock hold, so a dead socket costs at most one write timeout.
//!
//! Nothing in here logs: the log sink writes through this type, and a
//! log call made while the lock is held would deadlock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::TransportError;

use super::codec;
use super::transport::{ByteSink, Link, SerialTransport, TcpTransport, Transport};

struct Outputs {
    serial: SerialTransport,
    tcp: TcpTransport,
}

impl Outputs {
    fn get_mut(&mut self, link: Link) -> &mut dyn Transport {
        match link {
            Link::Serial => &mut self.serial,
            Link::Tcp => &mut self.tcp,
        }
    }

    fn get(&self, link: Link) -> &dyn Transport {
        match link {
            Link::Serial => &self.serial,
            Link::Tcp => &self.tcp,
        }
    }
}

/// A link pinned to the client that was attached when the route was taken.
///
/// Serial has a single connection for the life of the process.  A TCP route
/// goes stale as soon as another client attaches, and writes through it
/// fail with [`TransportError::NotConnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub link: Link,
    connection: u64,
}

/// Per-link outcome of a broadcast [`OutputFanout::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub serial: Result<(), TransportError>,
    pub tcp: Result<(), TransportError>,
}

impl SendReport {
    pub fn get(&self, link: Link) -> Result<(), TransportError> {
        match link {
            Link::Serial => self.serial,
            Link::Tcp => self.tcp,
        }
    }

    /// At least one link took the frame.
    pub fn delivered(&self) -> bool {
        self.serial.is_ok() || self.tcp.is_ok()
    }
}

/// Serialising writer over all transports.
pub struct OutputFanout {
    outputs: Mutex<Outputs>,
}

impl OutputFanout {
    pub fn new(serial: SerialTransport) -> Self {
        Self {
            outputs: Mutex::new(Outputs {
                serial,
                tcp: TcpTransport::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Outputs> {
        // A producer that panicked mid-write leaves at worst a torn frame,
        // which the peer's decoder discards.
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frame `payload` for `address` and write it to one link.
    pub fn send_to(&self, link: Link, address: u8, payload: &[u8]) -> Result<(), TransportError> {
        let frame = codec::encode_frame(address, payload).map_err(|_| TransportError::FrameTooLarge)?;
        let mut outputs = self.lock();
        write_link(&mut outputs, link, &frame)
    }

    /// The current connection on `link`.
    pub fn route(&self, link: Link) -> Route {
        let connection = match link {
            Link::Serial => 0,
            Link::Tcp => self.lock().tcp.connection(),
        };
        Route { link, connection }
    }

    /// Like [`send_to`](Self::send_to), but only while `route` still names
    /// the attached client.
    pub fn send_on(&self, route: Route, address: u8, payload: &[u8]) -> Result<(), TransportError> {
        let frame = codec::encode_frame(address, payload).map_err(|_| TransportError::FrameTooLarge)?;
        let mut outputs = self.lock();
        if route.link == Link::Tcp && outputs.tcp.connection() != route.connection {
            return Err(TransportError::NotConnected);
        }
        write_link(&mut outputs, route.link, &frame)
    }

    /// Frame `payload` once and write it to every link independently.
    ///
    /// A failure on one link never prevents delivery to the other; an
    /// unattached TCP link reports [`TransportError::NotConnected`].
    pub fn send(&self, address: u8, payload: &[u8]) -> SendReport {
        let frame = match codec::encode_frame(address, payload) {
            Ok(f) => f,
            Err(_) => {
                return SendReport {
                    serial: Err(TransportError::FrameTooLarge),
                    tcp: Err(TransportError::FrameTooLarge),
                };
            }
        };

        let mut outputs = self.lock();
        SendReport {
            serial: write_link(&mut outputs, Link::Serial, &frame),
            tcp: write_link(&mut outputs, Link::Tcp, &frame),
        }
    }

    /// Attach the write half of a newly accepted TCP client.  Returns its
    /// connection number.
    pub fn attach_tcp(&self, writer: ByteSink) -> u64 {
        self.lock().tcp.attach(writer)
    }

    /// Detach the TCP client.  Returns `true` if one was attached.
    pub fn detach_tcp(&self) -> bool {
        self.lock().tcp.detach()
    }

    pub fn is_attached(&self, link: Link) -> bool {
        self.lock().get(link).is_attached()
    }
}

fn write_link(outputs: &mut Outputs, link: Link, frame: &[u8]) -> Result<(), TransportError> {
    let result = write_frame(outputs.get_mut(link), frame);
    if link == Link::Tcp && matches!(result, Err(TransportError::Io(_))) {
        outputs.tcp.detach();
    }
    result
}

fn write_frame(transport: &mut dyn Transport, frame: &[u8]) -> Result<(), TransportError> {
    if !transport.is_attached() {
        return Err(TransportError::NotConnected);
    }
    transport.write_all(frame)?;
    transport.flush()
}
