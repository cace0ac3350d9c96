//! Fuzz target: serial ingest into the dispatch engine
//!
//! Feeds arbitrary bytes through `Ingest` into an engine with the full
//! device service registered on simulated hardware.  Checks that no
//! input panics and that everything written back to the link is made of
//! intact frames.
//!
//! cargo fuzz run fuzz_ingest

#![no_main]

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use picolink::adapters::led::SimLed;
use picolink::adapters::nvs::MemorySettingsStore;
use picolink::adapters::sensor::SimDht22;
use picolink::app::sampler::{RateLimitedSensor, SharedSensor};
use picolink::app::service::DeviceService;
use picolink::rpc::codec::{FrameDecoder, RPC_ADDRESS};
use picolink::rpc::engine::DispatchEngine;
use picolink::rpc::fanout::OutputFanout;
use picolink::rpc::ingest::Ingest;
use picolink::rpc::registry::Registry;
use picolink::rpc::stream::StreamSlot;
use picolink::rpc::transport::{Link, SerialTransport};
use picolink::settings::Settings;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let out = Capture::default();
    let fanout = Arc::new(OutputFanout::new(SerialTransport::new(out.clone())));
    let sensor = SharedSensor::new(RateLimitedSensor::new(Box::new(SimDht22::default()), Duration::ZERO));
    let settings = Arc::new(Settings::load(Box::new(MemorySettingsStore::new())));
    let service = Arc::new(DeviceService::new(SimLed::new(), sensor, settings, Arc::new(StreamSlot::new())));
    let engine = DispatchEngine::new(service.register(Registry::builder()).build(), fanout, RPC_ADDRESS);

    Ingest::new(&engine, Link::Serial, RPC_ADDRESS).feed(data);

    let written = out.0.lock().unwrap().clone();
    let mut decoder = FrameDecoder::new();
    for &b in &written {
        assert!(decoder.process(b).is_ok(), "device wrote a damaged frame");
    }
});
