//! Host device harness for integration tests.
//!
//! Wires the real service, registry, engine and stream slot to the
//! simulated LED and DHT22, with the serial link captured in memory so
//! tests can decode every frame the device emitted.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use picolink::adapters::led::{LedProbe, SimLed};
use picolink::adapters::nvs::MemorySettingsStore;
use picolink::adapters::sensor::{SimDht22, SimDht22Control};
use picolink::app::sampler::{RateLimitedSensor, SharedSensor};
use picolink::app::service::DeviceService;
use picolink::rpc::codec::{self, FrameDecoder, RPC_ADDRESS};
use picolink::rpc::engine::{Dispatch, DispatchEngine};
use picolink::rpc::fanout::OutputFanout;
use picolink::rpc::packet::{RpcPacket, ids};
use picolink::rpc::registry::Registry;
use picolink::rpc::session::StreamSession;
use picolink::rpc::stream::StreamSlot;
use picolink::rpc::transport::{Link, SerialTransport};
use picolink::settings::Settings;
use serde::Serialize;

// ── Captured output ───────────────────────────────────────────

/// Shared in-memory byte sink.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl Capture {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    /// Every frame in the capture as (address, payload).
    pub fn frames(&self) -> Vec<(u8, Vec<u8>)> {
        let mut decoder = FrameDecoder::new();
        self.bytes()
            .iter()
            .filter_map(|&b| {
                decoder
                    .process(b)
                    .expect("device emitted a damaged frame")
                    .map(|f| (f.address, f.payload.to_vec()))
            })
            .collect()
    }

    /// Every RPC packet in the capture.
    pub fn packets(&self) -> Vec<RpcPacket> {
        self.frames()
            .into_iter()
            .filter(|(addr, _)| *addr == RPC_ADDRESS)
            .map(|(_, p)| RpcPacket::decode(&p).unwrap())
            .collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Device ────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct Device {
    pub engine: Arc<DispatchEngine>,
    pub fanout: Arc<OutputFanout>,
    pub slot: Arc<StreamSlot>,
    pub settings: Arc<Settings>,
    pub sensor: SharedSensor,
    pub sensor_control: Arc<SimDht22Control>,
    pub led: LedProbe,
    pub serial: Capture,
}

#[allow(dead_code)]
impl Device {
    /// Full device with an unpaced sensor and in-memory settings.
    pub fn new() -> Self {
        Self::with_sensor_interval(Duration::ZERO)
    }

    pub fn with_sensor_interval(min_interval: Duration) -> Self {
        let serial = Capture::default();
        let fanout = Arc::new(OutputFanout::new(SerialTransport::new(serial.clone())));

        let dht = SimDht22::default();
        let sensor_control = dht.control();
        let sensor = SharedSensor::new(RateLimitedSensor::new(Box::new(dht), min_interval));

        let led = SimLed::new();
        let probe = led.probe();
        let settings = Arc::new(Settings::load(Box::new(MemorySettingsStore::new())));
        let slot = Arc::new(StreamSlot::new());

        let service = Arc::new(DeviceService::new(
            led,
            sensor.clone(),
            settings.clone(),
            slot.clone(),
        ));
        let registry = service.register(Registry::builder()).build();
        let engine = Arc::new(DispatchEngine::new(registry, fanout.clone(), RPC_ADDRESS));

        Self {
            engine,
            fanout,
            slot,
            settings,
            sensor,
            sensor_control,
            led: probe,
            serial,
        }
    }

    /// Session pushing into this device's stream slot.
    pub fn session(&self) -> StreamSession {
        StreamSession::new(self.slot.clone(), self.sensor.clone(), Duration::ZERO)
    }

    /// Dispatch a request for `method` on `link`.
    pub fn call<T: Serialize>(&self, link: Link, method: u32, call_id: u32, body: &T) -> Dispatch {
        let packet = request(method, call_id, body);
        self.engine.process_packet(link, &packet.encode().unwrap())
    }

    /// Dispatch raw packet bytes on `link`.
    pub fn call_raw(&self, link: Link, packet: &RpcPacket) -> Dispatch {
        self.engine.process_packet(link, &packet.encode().unwrap())
    }
}

/// Request packet for the device service.
pub fn request<T: Serialize>(method: u32, call_id: u32, body: &T) -> RpcPacket {
    RpcPacket::request(
        ids::DEVICE_SERVICE,
        method,
        call_id,
        postcard::to_allocvec(body).unwrap(),
    )
}

/// `request` framed for the RPC address.
#[allow(dead_code)]
pub fn request_frame<T: Serialize>(method: u32, call_id: u32, body: &T) -> Vec<u8> {
    codec::encode_frame(RPC_ADDRESS, &request(method, call_id, body).encode().unwrap()).unwrap()
}
