//! Request and response bodies of the device service.
//!
//! Encoded with postcard inside [`RpcPacket::payload`](crate::rpc::packet::RpcPacket).
//! String fields are bounded; an over-long string fails to decode and the
//! call is answered with `DATA_LOSS`.

use heapless::String;
use serde::{Deserialize, Serialize};

pub const ECHO_MSG_LEN: usize = 64;
pub const SSID_LEN: usize = 32;
pub const PASSWORD_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedRequest {
    pub on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EchoMessage {
    pub msg: String<ECHO_MSG_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorResponse {
    pub temperature: f32,
    pub humidity: f32,
}

impl From<crate::app::ports::SensorReading> for SensorResponse {
    fn from(r: crate::app::ports::SensorReading) -> Self {
        Self {
            temperature: r.temperature_c,
            humidity: r.humidity_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiSettings {
    pub ssid: String<SSID_LEN>,
    pub password: String<PASSWORD_LEN>,
}
