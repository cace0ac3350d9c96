//! RPC packet envelope, status codes and procedure ids.
//!
//! Every frame on the RPC address carries exactly one postcard-encoded
//! [`RpcPacket`].  Request/response bodies travel opaque in `payload` and
//! are decoded by the registered procedure.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Channel used by both the serial and TCP links.
pub const DEFAULT_CHANNEL_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    // client → device
    Request,
    ClientCancel,
    // device → client
    Response,
    ServerStream,
    ServerError,
}

impl PacketKind {
    pub fn is_client(self) -> bool {
        matches!(self, Self::Request | Self::ClientCancel)
    }
}

/// Completion status, numbered like the canonical RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
    Unavailable,
    DataLoss,
}

impl Status {
    pub fn code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Cancelled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::NotFound => 5,
            Self::FailedPrecondition => 9,
            Self::Internal => 13,
            Self::Unavailable => 14,
            Self::DataLoss => 15,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
        };
        f.write_str(name)
    }
}

/// One RPC packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcPacket {
    pub kind: PacketKind,
    pub channel_id: u32,
    pub service_id: u32,
    pub method_id: u32,
    pub call_id: u32,
    pub status: Status,
    pub payload: Vec<u8>,
}

impl RpcPacket {
    pub fn request(service_id: u32, method_id: u32, call_id: u32, payload: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Request,
            channel_id: DEFAULT_CHANNEL_ID,
            service_id,
            method_id,
            call_id,
            status: Status::Ok,
            payload,
        }
    }

    pub fn cancel(service_id: u32, method_id: u32, call_id: u32) -> Self {
        Self {
            kind: PacketKind::ClientCancel,
            status: Status::Cancelled,
            ..Self::request(service_id, method_id, call_id, Vec::new())
        }
    }

    /// Server packet answering `self`, with the same routing ids.
    pub fn reply(&self, kind: PacketKind, status: Status, payload: Vec<u8>) -> Self {
        Self {
            kind,
            channel_id: self.channel_id,
            service_id: self.service_id,
            method_id: self.method_id,
            call_id: self.call_id,
            status,
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// 65599-polynomial string hash used for service and method ids.
pub const fn hash_name(name: &str) -> u32 {
    const HASH_CONSTANT: u32 = 65599;
    let bytes = name.as_bytes();
    let mut hash = bytes.len() as u32;
    let mut coefficient = HASH_CONSTANT;
    let mut i = 0;
    while i < bytes.len() {
        hash = hash.wrapping_add(coefficient.wrapping_mul(bytes[i] as u32));
        coefficient = coefficient.wrapping_mul(HASH_CONSTANT);
        i += 1;
    }
    hash
}

/// Ids of the device service and its procedures.
pub mod ids {
    use super::hash_name;

    pub const SERVICE_NAME: &str = "practice.rpc.DeviceService";

    pub const DEVICE_SERVICE: u32 = hash_name(SERVICE_NAME);
    pub const SET_LED: u32 = hash_name("SetLed");
    pub const ECHO: u32 = hash_name("Echo");
    pub const GET_SENSOR_DATA: u32 = hash_name("GetSensorData");
    pub const START_SENSOR_STREAM: u32 = hash_name("StartSensorStream");
    pub const STOP_SENSOR_STREAM: u32 = hash_name("StopSensorStream");
    pub const CONFIGURE_WIFI: u32 = hash_name("ConfigureWifi");
}
