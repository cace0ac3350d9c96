//! Ingest loop: bridges one inbound byte stream to the engine.
//!
//! Each transport gets its own [`Ingest`] with its own [`FrameDecoder`]:
//! the serial link on the main thread, and one per accepted TCP client on
//! the `rpc-net` thread.  Frames are dispatched in arrival order on the
//! thread that read them.
//!
//! ```text
//!  Read ──▶ FrameDecoder ──▶ address == RPC ? ──▶ DispatchEngine
//!                                  └─ else: ignored
//! ```

use std::io::{ErrorKind, Read};

use log::{debug, info};

use super::codec::FrameDecoder;
use super::engine::DispatchEngine;
use super::transport::Link;

pub struct Ingest<'a> {
    engine: &'a DispatchEngine,
    link: Link,
    rpc_address: u8,
    decoder: FrameDecoder,
    dispatched: u64,
}

impl<'a> Ingest<'a> {
    pub fn new(engine: &'a DispatchEngine, link: Link, rpc_address: u8) -> Self {
        Self {
            engine,
            link,
            rpc_address,
            decoder: FrameDecoder::new(),
            dispatched: 0,
        }
    }

    /// Frames dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Decode `bytes` and dispatch every complete RPC frame.
    pub fn feed(&mut self, bytes: &[u8]) {
        let link = self.link;
        for &byte in bytes {
            match self.decoder.process(byte) {
                Ok(None) => {}
                Ok(Some(frame)) if frame.address == self.rpc_address => {
                    self.engine.process_packet(link, frame.payload);
                    self.dispatched += 1;
                }
                Ok(Some(frame)) => {
                    debug!("RPC[{link}]: ignoring frame for address {}", frame.address);
                }
                Err(e) => debug!("RPC[{link}]: {e}"),
            }
        }
    }

    /// Read `reader` in `chunk`-sized pieces until end of stream.
    ///
    /// Returns `Ok(())` on a clean EOF and the read error otherwise.
    pub fn run<R: Read>(&mut self, mut reader: R, chunk: usize) -> std::io::Result<()> {
        let mut buf = vec![0u8; chunk.max(1)];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    info!("RPC[{}]: end of stream after {} frames", self.link, self.dispatched);
                    return Ok(());
                }
                Ok(n) => self.feed(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e),
            }
        }
    }
}
