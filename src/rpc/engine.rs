//! RPC engine: dispatches decoded packets to registered procedures.
//!
//! **Transport-decoupled**: the engine does not read from any transport.
//! Ingest loops feed it `(link, payload)` for every frame decoded on the
//! RPC address via [`DispatchEngine::process_packet`]; replies go out
//! through the shared [`OutputFanout`] on the link the request came from.
//!
//! ```text
//!  RpcPacket ──▶ lookup (service_id, method_id)
//!                   ├─ miss            → ServerError(NOT_FOUND)
//!                   ├─ Unary           → handler → Response(status)
//!                   └─ ServerStream    → StreamSlot::open (previous finished)
//!  ClientCancel ──▶ StreamSlot::cancel
//! ```
//!
//! The engine holds no mutable state of its own; a single instance is
//! shared by the serial and TCP ingest threads.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::TransportError;

use super::fanout::OutputFanout;
use super::packet::{PacketKind, RpcPacket, Status};
use super::registry::{CallError, Procedure, ProcedureId, Registry};
use super::stream::StreamWriter;
use super::transport::Link;

/// What [`DispatchEngine::process_packet`] did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Undecodable header or a server-side packet kind; nothing sent.
    Dropped,
    /// A `Response` or `ServerError` was emitted with this status.
    Replied(Status),
    /// A server stream was opened.
    StreamOpened { generation: u64 },
    /// A client cancel closed the open stream.
    Cancelled,
    /// A client cancel that matched no open stream.
    Ignored,
}

pub struct DispatchEngine {
    registry: Registry,
    fanout: Arc<OutputFanout>,
    address: u8,
}

impl DispatchEngine {
    /// `address` is the frame address replies are sent on.
    pub fn new(registry: Registry, fanout: Arc<OutputFanout>, address: u8) -> Self {
        Self {
            registry,
            fanout,
            address,
        }
    }

    pub fn fanout(&self) -> &Arc<OutputFanout> {
        &self.fanout
    }

    /// Decode one packet received on `link` and dispatch it.
    ///
    /// May block for as long as the handler does.
    pub fn process_packet(&self, link: Link, bytes: &[u8]) -> Dispatch {
        let packet = match RpcPacket::decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                warn!("RPC[{link}]: dropping undecodable packet ({} bytes): {e}", bytes.len());
                return Dispatch::Dropped;
            }
        };

        match packet.kind {
            PacketKind::Request => self.handle_request(link, &packet),
            PacketKind::ClientCancel => self.handle_cancel(link, &packet),
            kind => {
                debug!("RPC[{link}]: ignoring {kind:?} packet from client");
                Dispatch::Dropped
            }
        }
    }

    fn handle_request(&self, link: Link, packet: &RpcPacket) -> Dispatch {
        let id = ProcedureId::new(packet.service_id, packet.method_id);
        let Some(procedure) = self.registry.get(id) else {
            warn!(
                "RPC[{link}]: no procedure {:#010x}/{:#010x}",
                packet.service_id, packet.method_id
            );
            return self.reply(link, packet, PacketKind::ServerError, Status::NotFound, Vec::new());
        };

        match procedure {
            Procedure::Unary(handler) => match handler(&packet.payload) {
                Ok(body) => self.reply(link, packet, PacketKind::Response, Status::Ok, body),
                Err(CallError::Failed(status)) => {
                    self.reply(link, packet, PacketKind::Response, status, Vec::new())
                }
                Err(CallError::Malformed) => {
                    warn!("RPC[{link}]: malformed request for call {}", packet.call_id);
                    self.reply(link, packet, PacketKind::ServerError, Status::DataLoss, Vec::new())
                }
            },
            Procedure::ServerStream { validate, slot } => {
                if !validate(&packet.payload) {
                    warn!("RPC[{link}]: malformed stream request for call {}", packet.call_id);
                    return self.reply(
                        link,
                        packet,
                        PacketKind::ServerError,
                        Status::DataLoss,
                        Vec::new(),
                    );
                }
                let writer = StreamWriter::new(self.fanout.clone(), link, self.address, packet);
                let generation = slot.open(writer);
                info!("RPC[{link}]: stream #{generation} opened (call {})", packet.call_id);
                Dispatch::StreamOpened { generation }
            }
        }
    }

    fn handle_cancel(&self, link: Link, packet: &RpcPacket) -> Dispatch {
        let id = ProcedureId::new(packet.service_id, packet.method_id);
        match self.registry.get(id) {
            Some(Procedure::ServerStream { slot, .. }) if slot.cancel(link, packet.call_id) => {
                info!("RPC[{link}]: stream call {} cancelled by client", packet.call_id);
                Dispatch::Cancelled
            }
            _ => {
                debug!("RPC[{link}]: cancel for call {} matched nothing", packet.call_id);
                Dispatch::Ignored
            }
        }
    }

    fn reply(
        &self,
        link: Link,
        request: &RpcPacket,
        kind: PacketKind,
        status: Status,
        payload: Vec<u8>,
    ) -> Dispatch {
        let packet = request.reply(kind, status, payload);
        let sent = packet
            .encode()
            .map_err(|_| TransportError::Encode)
            .and_then(|bytes| self.fanout.send_to(link, self.address, &bytes));
        match sent {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                debug!("RPC[{link}]: client gone before reply to call {}", request.call_id);
            }
            Err(e) => warn!("RPC[{link}]: reply to call {} failed: {e}", request.call_id),
        }
        Dispatch::Replied(status)
    }
}
