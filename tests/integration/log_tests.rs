//! Device log lines as they reach the wire through the global logger.

use std::sync::{Arc, OnceLock};

use log::LevelFilter;
use picolink::adapters::log_sink::{FrameLogger, LogRecord};
use picolink::app::messages::{EchoMessage, WifiSettings};
use picolink::rpc::codec::LOG_ADDRESS;
use picolink::rpc::fanout::OutputFanout;
use picolink::rpc::packet::ids;
use picolink::rpc::transport::{Link, SerialTransport};

use crate::mock_hw::{Capture, Device};

/// Installs the frame logger once for the whole test binary and returns
/// the link it writes to.  Other tests log through it too.
fn log_wire() -> &'static Capture {
    static WIRE: OnceLock<Capture> = OnceLock::new();
    WIRE.get_or_init(|| {
        let wire = Capture::default();
        let fanout = Arc::new(OutputFanout::new(SerialTransport::new(wire.clone())));
        FrameLogger::new(fanout, LOG_ADDRESS, LevelFilter::Info)
            .install()
            .unwrap();
        wire
    })
}

fn logged_messages(wire: &Capture) -> Vec<String> {
    wire.frames()
        .iter()
        .filter(|(address, _)| *address == LOG_ADDRESS)
        .filter_map(|(_, payload)| LogRecord::decode(payload).ok())
        .map(|record| record.message)
        .collect()
}

#[test]
fn echo_and_wifi_requests_log_their_text() {
    let wire = log_wire();
    let dev = Device::new();

    dev.call(
        Link::Serial,
        ids::ECHO,
        1,
        &EchoMessage {
            msg: heapless::String::try_from("ping-7f3a").unwrap(),
        },
    );
    dev.call(
        Link::Serial,
        ids::CONFIGURE_WIFI,
        2,
        &WifiSettings {
            ssid: heapless::String::try_from("Attic-5G").unwrap(),
            password: heapless::String::try_from("password1").unwrap(),
        },
    );

    let messages = logged_messages(wire);
    assert!(messages.iter().any(|m| m == "Echo requested: ping-7f3a"));
    assert!(messages.iter().any(|m| m == "Configuring Wi-Fi: SSID=Attic-5G"));
}
