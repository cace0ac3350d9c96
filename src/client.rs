//! Host-side RPC client.
//!
//! Speaks the device protocol over any `Read + Write` byte stream (a
//! serial port, a `TcpStream`, or an in-memory pipe in tests).  Log frames
//! that arrive while waiting for a reply are decoded and kept for
//! [`RpcClient::drain_logs`]; stream items for other calls are queued.
//!
//! Calls are synchronous: each method writes one request frame and reads
//! until the matching reply arrives.  Set a read timeout on the
//! underlying stream to bound the wait.

use std::collections::VecDeque;
use std::io::{Read, Write};

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::adapters::log_sink::LogRecord;
use crate::app::messages::{
    EchoMessage, Empty, LedRequest, SensorRequest, SensorResponse, WifiSettings,
};
use crate::error::ClientError;
use crate::rpc::codec::{self, FrameDecoder, LOG_ADDRESS, RPC_ADDRESS};
use crate::rpc::packet::{PacketKind, RpcPacket, Status, ids};

/// One event on an open server stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Item(T),
    /// The device ended the stream with this status.
    Finished(Status),
}

pub struct RpcClient<S> {
    stream: S,
    decoder: FrameDecoder,
    rx: Vec<u8>,
    rx_pos: usize,
    rx_len: usize,
    service_id: u32,
    next_call_id: u32,
    backlog: VecDeque<RpcPacket>,
    logs: Vec<LogRecord>,
}

impl<S: Read + Write> RpcClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
            rx: vec![0; 1024],
            rx_pos: 0,
            rx_len: 0,
            service_id: ids::DEVICE_SERVICE,
            next_call_id: 1,
            backlog: VecDeque::new(),
            logs: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Log records received so far.
    pub fn drain_logs(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.logs)
    }

    // ── Raw calls ────────────────────────────────────────────

    fn send(&mut self, packet: &RpcPacket) -> Result<(), ClientError> {
        let bytes = packet.encode().map_err(|_| ClientError::Encode)?;
        let frame = codec::encode_frame(RPC_ADDRESS, &bytes).map_err(|_| ClientError::Encode)?;
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn alloc_call_id(&mut self) -> u32 {
        let id = self.next_call_id;
        self.next_call_id = self.next_call_id.wrapping_add(1).max(1);
        id
    }

    fn next_frame(&mut self) -> Result<(u8, Vec<u8>), ClientError> {
        loop {
            while self.rx_pos < self.rx_len {
                let byte = self.rx[self.rx_pos];
                self.rx_pos += 1;
                match self.decoder.process(byte) {
                    Ok(Some(frame)) => return Ok((frame.address, frame.payload.to_vec())),
                    Ok(None) => {}
                    Err(e) => debug!("client: {e}"),
                }
            }
            let n = self.stream.read(&mut self.rx)?;
            if n == 0 {
                return Err(ClientError::Closed);
            }
            self.rx_pos = 0;
            self.rx_len = n;
        }
    }

    /// Next RPC packet from the device, collecting log frames on the way.
    fn next_packet(&mut self) -> Result<RpcPacket, ClientError> {
        loop {
            let (address, payload) = self.next_frame()?;
            match address {
                RPC_ADDRESS => match RpcPacket::decode(&payload) {
                    Ok(p) => return Ok(p),
                    Err(e) => debug!("client: undecodable packet: {e}"),
                },
                LOG_ADDRESS => match LogRecord::decode(&payload) {
                    Ok(r) => self.logs.push(r),
                    Err(e) => debug!("client: undecodable log record: {e}"),
                },
                other => debug!("client: ignoring frame for address {other}"),
            }
        }
    }

    /// Wait for a packet of `call_id` matching `accept`; others are queued.
    fn wait_for(
        &mut self,
        call_id: u32,
        accept: impl Fn(&RpcPacket) -> bool,
    ) -> Result<RpcPacket, ClientError> {
        if let Some(i) = self
            .backlog
            .iter()
            .position(|p| p.call_id == call_id && accept(p))
        {
            if let Some(p) = self.backlog.remove(i) {
                return Ok(p);
            }
        }
        loop {
            let packet = self.next_packet()?;
            if packet.call_id == call_id && accept(&packet) {
                return Ok(packet);
            }
            self.backlog.push_back(packet);
        }
    }

    /// Invoke a unary procedure and decode its response.
    pub fn unary<Req, Resp>(&mut self, method_id: u32, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = postcard::to_allocvec(request).map_err(|_| ClientError::Encode)?;
        let call_id = self.alloc_call_id();
        self.send(&RpcPacket::request(self.service_id, method_id, call_id, body))?;

        let reply = self.wait_for(call_id, |p| {
            p.method_id == method_id
                && matches!(p.kind, PacketKind::Response | PacketKind::ServerError)
        })?;
        if !reply.status.is_ok() {
            return Err(ClientError::Status(reply.status));
        }
        postcard::from_bytes(&reply.payload).map_err(|_| ClientError::Decode)
    }

    /// Open a server stream.  Returns its call id.
    pub fn start_stream<Req: Serialize>(&mut self, method_id: u32, request: &Req) -> Result<u32, ClientError> {
        let body = postcard::to_allocvec(request).map_err(|_| ClientError::Encode)?;
        let call_id = self.alloc_call_id();
        self.send(&RpcPacket::request(self.service_id, method_id, call_id, body))?;
        Ok(call_id)
    }

    /// Next item or the terminal status of stream `call_id`.
    pub fn next_stream_event<T: DeserializeOwned>(&mut self, call_id: u32) -> Result<StreamEvent<T>, ClientError> {
        let packet = self.wait_for(call_id, |p| !p.kind.is_client())?;
        match packet.kind {
            PacketKind::ServerStream => postcard::from_bytes(&packet.payload)
                .map(StreamEvent::Item)
                .map_err(|_| ClientError::Decode),
            _ => Ok(StreamEvent::Finished(packet.status)),
        }
    }

    /// Ask the device to cancel stream `call_id`.
    pub fn cancel(&mut self, method_id: u32, call_id: u32) -> Result<(), ClientError> {
        self.send(&RpcPacket::cancel(self.service_id, method_id, call_id))
    }

    // ── Device service ───────────────────────────────────────

    pub fn set_led(&mut self, on: bool) -> Result<(), ClientError> {
        self.unary::<_, Empty>(ids::SET_LED, &LedRequest { on }).map(|_| ())
    }

    pub fn echo(&mut self, msg: &str) -> Result<String, ClientError> {
        let msg = heapless::String::try_from(msg).map_err(|()| ClientError::Encode)?;
        let reply: EchoMessage = self.unary(ids::ECHO, &EchoMessage { msg })?;
        Ok(reply.msg.as_str().to_owned())
    }

    pub fn get_sensor_data(&mut self) -> Result<SensorResponse, ClientError> {
        self.unary(ids::GET_SENSOR_DATA, &SensorRequest {})
    }

    pub fn start_sensor_stream(&mut self) -> Result<u32, ClientError> {
        self.start_stream(ids::START_SENSOR_STREAM, &SensorRequest {})
    }

    pub fn next_sensor_sample(&mut self, call_id: u32) -> Result<StreamEvent<SensorResponse>, ClientError> {
        self.next_stream_event(call_id)
    }

    pub fn stop_sensor_stream(&mut self) -> Result<(), ClientError> {
        self.unary::<_, Empty>(ids::STOP_SENSOR_STREAM, &Empty {}).map(|_| ())
    }

    pub fn configure_wifi(&mut self, ssid: &str, password: &str) -> Result<(), ClientError> {
        let request = WifiSettings {
            ssid: heapless::String::try_from(ssid).map_err(|()| ClientError::Encode)?,
            password: heapless::String::try_from(password).map_err(|()| ClientError::Encode)?,
        };
        self.unary::<_, Empty>(ids::CONFIGURE_WIFI, &request).map(|_| ())
    }
}
