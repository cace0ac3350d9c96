//! Sensor stream lifecycle: open, push, stop, supersede, cancel.

use std::io::{self, Write};

use picolink::app::messages::{Empty, SensorRequest, SensorResponse};
use picolink::error::{SensorError, TransportError};
use picolink::rpc::engine::Dispatch;
use picolink::rpc::packet::{PacketKind, RpcPacket, Status, ids};
use picolink::rpc::session::CycleOutcome;
use picolink::rpc::transport::Link;

use crate::mock_hw::{Capture, Device};

fn start(dev: &Device, link: Link, call_id: u32) -> Dispatch {
    dev.call(link, ids::START_SENSOR_STREAM, call_id, &SensorRequest {})
}

fn kinds_and_calls(packets: &[RpcPacket]) -> Vec<(PacketKind, u32)> {
    packets.iter().map(|p| (p.kind, p.call_id)).collect()
}

#[test]
fn open_push_stop() {
    let dev = Device::new();
    let session = dev.session();
    assert_eq!(session.cycle(), CycleOutcome::Idle);

    assert!(matches!(start(&dev, Link::Serial, 10), Dispatch::StreamOpened { .. }));
    for _ in 0..3 {
        assert!(matches!(session.cycle(), CycleOutcome::Pushed(_)));
    }
    dev.call(Link::Serial, ids::STOP_SENSOR_STREAM, 11, &Empty {});
    assert_eq!(session.cycle(), CycleOutcome::Idle);

    let packets = dev.serial.packets();
    assert_eq!(
        kinds_and_calls(&packets),
        vec![
            (PacketKind::ServerStream, 10),
            (PacketKind::ServerStream, 10),
            (PacketKind::ServerStream, 10),
            (PacketKind::Response, 10),
            (PacketKind::Response, 11),
        ]
    );
    for item in &packets[..3] {
        assert_eq!(item.method_id, ids::START_SENSOR_STREAM);
        let sample: SensorResponse = postcard::from_bytes(&item.payload).unwrap();
        assert!(sample.humidity > 0.0);
    }
    assert_eq!(packets[3].status, Status::Ok);
}

#[test]
fn second_start_finishes_the_first_stream() {
    let dev = Device::new();
    let session = dev.session();

    start(&dev, Link::Serial, 1);
    session.cycle();
    start(&dev, Link::Serial, 2);
    session.cycle();

    assert_eq!(
        kinds_and_calls(&dev.serial.packets()),
        vec![
            (PacketKind::ServerStream, 1),
            (PacketKind::Response, 1),
            (PacketKind::ServerStream, 2),
        ]
    );
}

#[test]
fn failed_sample_keeps_stream_open() {
    let dev = Device::new();
    let session = dev.session();
    start(&dev, Link::Serial, 1);

    dev.sensor_control.fail_next(1);
    assert!(matches!(
        session.cycle(),
        CycleOutcome::Skipped(SensorError::FetchFailed(_))
    ));
    assert!(dev.slot.is_active());
    assert!(matches!(session.cycle(), CycleOutcome::Pushed(_)));
    assert_eq!(dev.serial.packets().len(), 1);
}

#[test]
fn client_cancel_must_match_link_and_call() {
    let dev = Device::new();
    start(&dev, Link::Serial, 5);

    let wrong_call = RpcPacket::cancel(ids::DEVICE_SERVICE, ids::START_SENSOR_STREAM, 6);
    assert_eq!(dev.call_raw(Link::Serial, &wrong_call), Dispatch::Ignored);
    let right_call = RpcPacket::cancel(ids::DEVICE_SERVICE, ids::START_SENSOR_STREAM, 5);
    assert_eq!(dev.call_raw(Link::Tcp, &right_call), Dispatch::Ignored);
    assert!(dev.slot.is_active());

    assert_eq!(dev.call_raw(Link::Serial, &right_call), Dispatch::Cancelled);
    assert!(!dev.slot.is_active());
    let last = dev.serial.packets().pop().unwrap();
    assert_eq!((last.kind, last.status, last.call_id), (PacketKind::Response, Status::Cancelled, 5));
}

#[test]
fn stream_on_detached_tcp_is_dropped_on_first_push() {
    let dev = Device::new();
    let session = dev.session();
    start(&dev, Link::Tcp, 1);

    assert_eq!(
        session.cycle(),
        CycleOutcome::WriterFailed(TransportError::NotConnected)
    );
    assert!(!dev.slot.is_active());
    assert_eq!(session.cycle(), CycleOutcome::Idle);
}

#[test]
fn stream_does_not_follow_tcp_to_the_next_client() {
    let dev = Device::new();
    let session = dev.session();
    let first = Capture::default();
    dev.fanout.attach_tcp(Box::new(first.clone()));
    start(&dev, Link::Tcp, 42);
    assert!(matches!(session.cycle(), CycleOutcome::Pushed(_)));

    dev.fanout.detach_tcp();
    let second = Capture::default();
    dev.fanout.attach_tcp(Box::new(second.clone()));

    assert_eq!(
        session.cycle(),
        CycleOutcome::WriterFailed(TransportError::NotConnected)
    );
    assert!(!dev.slot.is_active());
    assert_eq!(kinds_and_calls(&first.packets()), vec![(PacketKind::ServerStream, 42)]);
    assert!(second.packets().is_empty());
}

#[test]
fn new_tcp_client_cannot_cancel_an_old_stream() {
    let dev = Device::new();
    dev.fanout.attach_tcp(Box::new(Capture::default()));
    start(&dev, Link::Tcp, 7);
    dev.fanout.detach_tcp();
    dev.fanout.attach_tcp(Box::new(Capture::default()));

    let cancel = RpcPacket::cancel(ids::DEVICE_SERVICE, ids::START_SENSOR_STREAM, 7);
    assert_eq!(dev.call_raw(Link::Tcp, &cancel), Dispatch::Ignored);
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn write_error_removes_the_stream() {
    let dev = Device::new();
    dev.fanout.attach_tcp(Box::new(BrokenPipe));
    let session = dev.session();
    start(&dev, Link::Tcp, 1);

    assert!(matches!(session.cycle(), CycleOutcome::WriterFailed(_)));
    assert!(!dev.slot.is_active());

    // Stop after the writer failed is still a plain OK.
    assert_eq!(
        dev.call(Link::Serial, ids::STOP_SENSOR_STREAM, 2, &Empty {}),
        Dispatch::Replied(Status::Ok)
    );
}
