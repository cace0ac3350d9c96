//! Immutable procedure table.
//!
//! Procedures are registered once through [`RegistryBuilder`] at startup;
//! the resulting [`Registry`] is read-only and shared by every ingest
//! thread.  Typed handlers are erased to byte-level closures here, so the
//! engine never sees message types.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::packet::Status;
use super::stream::StreamSlot;

/// `(service_id, method_id)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureId {
    pub service_id: u32,
    pub method_id: u32,
}

impl ProcedureId {
    pub const fn new(service_id: u32, method_id: u32) -> Self {
        Self {
            service_id,
            method_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Unary,
    ServerStream,
}

/// Why an erased unary call produced no response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// The request payload did not decode; the handler was not invoked.
    Malformed,
    /// The handler ran and returned a non-OK status.
    Failed(Status),
}

type UnaryFn = Box<dyn Fn(&[u8]) -> Result<Vec<u8>, CallError> + Send + Sync>;
type ValidateFn = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

pub enum Procedure {
    Unary(UnaryFn),
    ServerStream {
        /// Checks that the request payload decodes.
        validate: ValidateFn,
        slot: Arc<StreamSlot>,
    },
}

impl Procedure {
    pub fn kind(&self) -> ProcedureKind {
        match self {
            Self::Unary(_) => ProcedureKind::Unary,
            Self::ServerStream { .. } => ProcedureKind::ServerStream,
        }
    }
}

pub struct Registry {
    procedures: HashMap<ProcedureId, Procedure>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, id: ProcedureId) -> Option<&Procedure> {
        self.procedures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    procedures: HashMap<ProcedureId, Procedure>,
}

impl RegistryBuilder {
    /// Register a unary procedure.
    ///
    /// The request is postcard-decoded before `handler` runs; a response
    /// that fails to encode is reported as [`Status::Internal`].
    #[must_use]
    pub fn unary<Req, Resp, F>(self, id: ProcedureId, handler: F) -> Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        F: Fn(Req) -> Result<Resp, Status> + Send + Sync + 'static,
    {
        let erased = move |bytes: &[u8]| -> Result<Vec<u8>, CallError> {
            let request: Req = postcard::from_bytes(bytes).map_err(|_| CallError::Malformed)?;
            let response = handler(request).map_err(CallError::Failed)?;
            postcard::to_allocvec(&response).map_err(|_| CallError::Failed(Status::Internal))
        };
        self.insert(id, Procedure::Unary(Box::new(erased)))
    }

    /// Register a server-streaming procedure whose open stream lives in
    /// `slot`.
    #[must_use]
    pub fn server_stream<Req>(self, id: ProcedureId, slot: Arc<StreamSlot>) -> Self
    where
        Req: DeserializeOwned + 'static,
    {
        let validate = |bytes: &[u8]| postcard::from_bytes::<Req>(bytes).is_ok();
        self.insert(
            id,
            Procedure::ServerStream {
                validate: Box::new(validate),
                slot,
            },
        )
    }

    fn insert(mut self, id: ProcedureId, procedure: Procedure) -> Self {
        if self.procedures.insert(id, procedure).is_some() {
            warn!(
                "RPC: procedure {:#010x}/{:#010x} registered twice, keeping the last",
                id.service_id, id.method_id
            );
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            procedures: self.procedures,
        }
    }
}
