//! Unary dispatch through the full device service.

use picolink::app::messages::{EchoMessage, Empty, LedRequest, SensorRequest, SensorResponse, WifiSettings};
use picolink::rpc::engine::Dispatch;
use picolink::rpc::packet::{PacketKind, RpcPacket, Status, ids};
use picolink::rpc::transport::Link;

use crate::mock_hw::{Capture, Device, request};

fn echo(msg: &str) -> EchoMessage {
    EchoMessage {
        msg: heapless::String::try_from(msg).unwrap(),
    }
}

#[test]
fn echo_returns_the_request() {
    let dev = Device::new();
    assert_eq!(
        dev.call(Link::Serial, ids::ECHO, 7, &echo("hi")),
        Dispatch::Replied(Status::Ok)
    );

    let replies = dev.serial.packets();
    assert_eq!(replies.len(), 1);
    let reply = &replies[0];
    assert_eq!(reply.kind, PacketKind::Response);
    assert_eq!(reply.call_id, 7);
    assert_eq!(reply.method_id, ids::ECHO);
    let body: EchoMessage = postcard::from_bytes(&reply.payload).unwrap();
    assert_eq!(body.msg.as_str(), "hi");
}

#[test]
fn led_follows_requests() {
    let dev = Device::new();
    dev.call(Link::Serial, ids::SET_LED, 1, &LedRequest { on: true });
    assert!(dev.led.is_on());
    dev.call(Link::Serial, ids::SET_LED, 2, &LedRequest { on: false });
    assert!(!dev.led.is_on());

    let statuses: Vec<Status> = dev.serial.packets().iter().map(|p| p.status).collect();
    assert_eq!(statuses, vec![Status::Ok, Status::Ok]);
}

#[test]
fn sensor_read_returns_a_sample() {
    let dev = Device::new();
    assert_eq!(
        dev.call(Link::Serial, ids::GET_SENSOR_DATA, 3, &SensorRequest {}),
        Dispatch::Replied(Status::Ok)
    );
    let reply = &dev.serial.packets()[0];
    let sample: SensorResponse = postcard::from_bytes(&reply.payload).unwrap();
    assert!((sample.temperature - 22.5).abs() <= 0.5 + f32::EPSILON);
    assert!((sample.humidity - 45.0).abs() <= 2.0 + f32::EPSILON);
}

#[test]
fn sensor_failure_is_internal_with_empty_body() {
    let dev = Device::new();
    dev.sensor_control.fail_next(1);
    assert_eq!(
        dev.call(Link::Serial, ids::GET_SENSOR_DATA, 3, &SensorRequest {}),
        Dispatch::Replied(Status::Internal)
    );
    let reply = &dev.serial.packets()[0];
    assert_eq!(reply.kind, PacketKind::Response);
    assert!(reply.payload.is_empty());
}

#[test]
fn unknown_method_is_not_found() {
    let dev = Device::new();
    assert_eq!(
        dev.call(Link::Serial, 0xDEAD_BEEF, 4, &Empty {}),
        Dispatch::Replied(Status::NotFound)
    );
    let reply = &dev.serial.packets()[0];
    assert_eq!(reply.kind, PacketKind::ServerError);
    assert_eq!(reply.status, Status::NotFound);
    assert_eq!(reply.call_id, 4);
}

#[test]
fn undecodable_request_body_is_data_loss() {
    let dev = Device::new();
    let packet = RpcPacket::request(ids::DEVICE_SERVICE, ids::SET_LED, 5, vec![2]);
    assert_eq!(dev.call_raw(Link::Serial, &packet), Dispatch::Replied(Status::DataLoss));
    assert!(!dev.led.is_on());
    assert_eq!(dev.serial.packets()[0].kind, PacketKind::ServerError);
}

#[test]
fn garbage_packet_is_dropped_silently() {
    let dev = Device::new();
    assert_eq!(dev.engine.process_packet(Link::Serial, &[0xFF; 3]), Dispatch::Dropped);
    assert!(dev.serial.packets().is_empty());
}

#[test]
fn stop_without_stream_is_ok_twice() {
    let dev = Device::new();
    for call in [1, 2] {
        assert_eq!(
            dev.call(Link::Serial, ids::STOP_SENSOR_STREAM, call, &Empty {}),
            Dispatch::Replied(Status::Ok)
        );
    }
    assert_eq!(dev.serial.packets().len(), 2);
}

#[test]
fn wifi_settings_are_validated_and_applied() {
    let dev = Device::new();
    let bad = WifiSettings {
        ssid: heapless::String::try_from("Home").unwrap(),
        password: heapless::String::try_from("short").unwrap(),
    };
    assert_eq!(
        dev.call(Link::Serial, ids::CONFIGURE_WIFI, 1, &bad),
        Dispatch::Replied(Status::InvalidArgument)
    );
    assert_eq!(dev.settings.credentials().ssid.as_str(), "YOURSSID");

    let good = WifiSettings {
        ssid: heapless::String::try_from("Home").unwrap(),
        password: heapless::String::try_from("password1").unwrap(),
    };
    assert_eq!(
        dev.call(Link::Serial, ids::CONFIGURE_WIFI, 2, &good),
        Dispatch::Replied(Status::Ok)
    );
    let creds = dev.settings.credentials();
    assert_eq!(creds.ssid.as_str(), "Home");
    assert_eq!(creds.password.as_str(), "password1");
}

#[test]
fn replies_go_back_on_the_request_link() {
    let dev = Device::new();
    let tcp = Capture::default();
    dev.fanout.attach_tcp(Box::new(tcp.clone()));

    dev.call(Link::Tcp, ids::ECHO, 1, &echo("over tcp"));
    dev.call(Link::Serial, ids::ECHO, 2, &echo("over serial"));

    let tcp_calls: Vec<u32> = tcp.packets().iter().map(|p| p.call_id).collect();
    let serial_calls: Vec<u32> = dev.serial.packets().iter().map(|p| p.call_id).collect();
    assert_eq!(tcp_calls, vec![1]);
    assert_eq!(serial_calls, vec![2]);
}

#[test]
fn reply_to_detached_tcp_is_dropped() {
    let dev = Device::new();
    assert_eq!(
        dev.call(Link::Tcp, ids::ECHO, 1, &echo("nobody")),
        Dispatch::Replied(Status::Ok)
    );
    assert!(dev.serial.packets().is_empty());
}

#[test]
fn request_builder_matches_client_ids() {
    let p = request(ids::ECHO, 9, &echo("x"));
    assert_eq!(p.service_id, ids::DEVICE_SERVICE);
    assert_eq!(p.kind, PacketKind::Request);
}
