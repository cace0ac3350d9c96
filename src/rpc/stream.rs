//! Server-stream writers and the single-owner slot that holds them.
//!
//! A streaming procedure has exactly one [`StreamSlot`].  Opening a new
//! stream moves the previous [`PendingStream`] out of the slot, finishes
//! it, and moves the new one in, all under the slot lock, so a pusher
//! never observes a half-replaced writer.
//!
//! Lock order: `StreamSlot` → `OutputFanout`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::TransportError;

use super::fanout::{OutputFanout, Route};
use super::packet::{PacketKind, RpcPacket, Status};
use super::transport::Link;

/// Writes `ServerStream` packets for one open call back to the client the
/// call arrived from.
///
/// The writer is pinned to that client's connection: once a TCP client
/// goes away every write fails with [`TransportError::NotConnected`], even
/// if another client has attached since.
pub struct StreamWriter {
    fanout: Arc<OutputFanout>,
    route: Route,
    address: u8,
    call: RpcPacket,
}

impl StreamWriter {
    /// `request` supplies the routing ids; its payload is dropped.
    pub fn new(fanout: Arc<OutputFanout>, link: Link, address: u8, request: &RpcPacket) -> Self {
        let route = fanout.route(link);
        Self {
            fanout,
            route,
            address,
            call: request.reply(PacketKind::Response, Status::Ok, Vec::new()),
        }
    }

    /// Whether a request arriving on `link` now comes from this writer's
    /// client.
    pub fn serves(&self, link: Link) -> bool {
        self.route == self.fanout.route(link)
    }

    pub fn call_id(&self) -> u32 {
        self.call.call_id
    }

    /// Send one stream item.
    pub fn write(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.send(PacketKind::ServerStream, Status::Ok, payload)
    }

    /// Terminate the call with `status`.  Consumes the writer.
    pub fn finish(self, status: Status) -> Result<(), TransportError> {
        self.send(PacketKind::Response, status, Vec::new())
    }

    fn send(&self, kind: PacketKind, status: Status, payload: Vec<u8>) -> Result<(), TransportError> {
        let packet = self.call.reply(kind, status, payload);
        let bytes = packet.encode().map_err(|_| TransportError::Encode)?;
        self.fanout.send_on(self.route, self.address, &bytes)
    }
}

/// The open stream of a streaming procedure.
pub struct PendingStream {
    writer: StreamWriter,
    generation: u64,
}

impl PendingStream {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of [`StreamSlot::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// No stream open; nothing written.
    Idle,
    Pushed { generation: u64 },
    /// The write failed and the stream was removed.
    Dropped(TransportError),
}

#[derive(Default)]
struct SlotState {
    pending: Option<PendingStream>,
    next_generation: u64,
}

/// Holder of at most one [`PendingStream`].
#[derive(Default)]
pub struct StreamSlot {
    state: Mutex<SlotState>,
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `writer` as the open stream and return its generation.
    ///
    /// An already-open stream is finished with [`Status::Ok`] before the
    /// new writer becomes visible.
    pub fn open(&self, writer: StreamWriter) -> u64 {
        let mut state = self.lock();
        if let Some(previous) = state.pending.take() {
            let generation = previous.generation;
            if let Err(e) = previous.writer.finish(Status::Ok) {
                debug!("RPC: finishing superseded stream #{generation} failed: {e}");
            }
        }
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);
        state.pending = Some(PendingStream { writer, generation });
        generation
    }

    /// Finish the open stream with `status`.  Returns `false` if the slot
    /// was already empty.
    pub fn close(&self, status: Status) -> bool {
        let mut state = self.lock();
        match state.pending.take() {
            Some(pending) => {
                if let Err(e) = pending.writer.finish(status) {
                    debug!("RPC: finishing stream #{} failed: {e}", pending.generation);
                }
                true
            }
            None => false,
        }
    }

    /// Finish the open stream with [`Status::Cancelled`] if it is the call
    /// `call_id` from the client currently on `link`.
    pub fn cancel(&self, link: Link, call_id: u32) -> bool {
        let mut state = self.lock();
        let matches = state
            .pending
            .as_ref()
            .is_some_and(|p| p.writer.call_id() == call_id && p.writer.serves(link));
        if !matches {
            return false;
        }
        if let Some(pending) = state.pending.take() {
            if let Err(e) = pending.writer.finish(Status::Cancelled) {
                debug!("RPC: finishing cancelled stream failed: {e}");
            }
        }
        true
    }

    /// Write one item to the open stream while holding the slot lock.
    pub fn push(&self, payload: Vec<u8>) -> PushOutcome {
        let mut state = self.lock();
        let Some(pending) = state.pending.as_ref() else {
            return PushOutcome::Idle;
        };
        let generation = pending.generation;
        match pending.writer.write(payload) {
            Ok(()) => PushOutcome::Pushed { generation },
            Err(e) => {
                state.pending = None;
                PushOutcome::Dropped(e)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Generation of the open stream, if any.
    pub fn generation(&self) -> Option<u64> {
        self.lock().pending.as_ref().map(PendingStream::generation)
    }
}
