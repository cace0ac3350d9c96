//! Concurrent producers sharing the output fan-out.

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{LevelFilter, Log, Record};
use picolink::adapters::log_sink::{FrameLogger, LogRecord};
use picolink::error::TransportError;
use picolink::rpc::codec::{LOG_ADDRESS, RPC_ADDRESS};
use picolink::rpc::fanout::OutputFanout;
use picolink::rpc::transport::{Link, SerialTransport};

use crate::mock_hw::Capture;

const PRODUCERS: u8 = 8;
const FRAMES_EACH: u16 = 50;

fn payload(producer: u8, seq: u16) -> Vec<u8> {
    // Include reserved bytes so escaping is exercised under contention.
    let mut p = vec![producer, 0x7E, 0x7D];
    p.extend_from_slice(&seq.to_le_bytes());
    p.extend(std::iter::repeat_n(producer, 40));
    p
}

fn check_all_frames(frames: &[(u8, Vec<u8>)]) {
    assert_eq!(frames.len(), usize::from(PRODUCERS) * usize::from(FRAMES_EACH));
    let mut next = vec![0u16; usize::from(PRODUCERS)];
    for (address, body) in frames {
        assert_eq!(*address, RPC_ADDRESS);
        let producer = body[0];
        let seq = u16::from_le_bytes([body[3], body[4]]);
        assert_eq!(*body, payload(producer, seq), "frame torn or corrupted");
        // Each producer's frames arrive in the order it sent them.
        assert_eq!(seq, next[usize::from(producer)]);
        next[usize::from(producer)] += 1;
    }
}

#[test]
fn concurrent_senders_never_interleave_frames() {
    let serial = Capture::default();
    let tcp = Capture::default();
    let fanout = Arc::new(OutputFanout::new(SerialTransport::new(serial.clone())));
    fanout.attach_tcp(Box::new(tcp.clone()));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let fanout = fanout.clone();
            thread::spawn(move || {
                for seq in 0..FRAMES_EACH {
                    let report = fanout.send(RPC_ADDRESS, &payload(producer, seq));
                    assert!(report.get(Link::Serial).is_ok());
                    assert!(report.get(Link::Tcp).is_ok());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    check_all_frames(&serial.frames());
    check_all_frames(&tcp.frames());
}

#[test]
fn log_records_and_replies_share_the_link_cleanly() {
    let serial = Capture::default();
    let fanout = Arc::new(OutputFanout::new(SerialTransport::new(serial.clone())));
    let logger = Arc::new(FrameLogger::new(fanout.clone(), LOG_ADDRESS, LevelFilter::Info));

    let replies = {
        let fanout = fanout.clone();
        thread::spawn(move || {
            for seq in 0..FRAMES_EACH {
                fanout.send_to(Link::Serial, RPC_ADDRESS, &payload(0, seq)).unwrap();
            }
        })
    };
    let logs = {
        let logger = logger.clone();
        thread::spawn(move || {
            for i in 0..FRAMES_EACH {
                logger.log(
                    &Record::builder()
                        .level(log::Level::Info)
                        .target("picolink::test")
                        .args(format_args!("line {i}"))
                        .build(),
                );
            }
        })
    };
    replies.join().unwrap();
    logs.join().unwrap();

    let frames = serial.frames();
    let rpc = frames.iter().filter(|(a, _)| *a == RPC_ADDRESS).count();
    let log_lines: Vec<String> = frames
        .iter()
        .filter(|(a, _)| *a == LOG_ADDRESS)
        .map(|(_, p)| LogRecord::decode(p).unwrap().message)
        .collect();
    assert_eq!(rpc, usize::from(FRAMES_EACH));
    assert_eq!(log_lines.len(), usize::from(FRAMES_EACH));
    assert_eq!(log_lines[0], "line 0");
}

#[test]
fn unattached_tcp_does_not_block_serial() {
    let serial = Capture::default();
    let fanout = OutputFanout::new(SerialTransport::new(serial.clone()));

    let report = fanout.send(RPC_ADDRESS, b"hello");
    assert!(report.delivered());
    assert_eq!(report.get(Link::Tcp), Err(TransportError::NotConnected));
    assert_eq!(serial.frames(), vec![(RPC_ADDRESS, b"hello".to_vec())]);

    assert_eq!(
        fanout.send_to(Link::Tcp, RPC_ADDRESS, b"x"),
        Err(TransportError::NotConnected)
    );
}

#[test]
fn detach_stops_tcp_delivery() {
    let serial = Capture::default();
    let tcp = Capture::default();
    let fanout = OutputFanout::new(SerialTransport::new(serial));
    fanout.attach_tcp(Box::new(tcp.clone()));
    assert!(fanout.is_attached(Link::Tcp));

    fanout.send(RPC_ADDRESS, b"one");
    assert!(fanout.detach_tcp());
    assert!(!fanout.detach_tcp());
    fanout.send(RPC_ADDRESS, b"two");

    assert_eq!(tcp.frames(), vec![(RPC_ADDRESS, b"one".to_vec())]);
}

/// A client whose every write stalls and then times out.
struct StalledClient;

impl Write for StalledClient {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(200));
        Err(io::ErrorKind::TimedOut.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn stalled_tcp_client_is_detached_after_one_failure() {
    let serial = Capture::default();
    let fanout = OutputFanout::new(SerialTransport::new(serial.clone()));
    fanout.attach_tcp(Box::new(StalledClient));

    let report = fanout.send(LOG_ADDRESS, b"first");
    assert_eq!(report.tcp, Err(TransportError::Io(io::ErrorKind::TimedOut)));
    assert!(!fanout.is_attached(Link::Tcp));

    let started = Instant::now();
    for _ in 0..5 {
        assert!(fanout.send(LOG_ADDRESS, b"later").serial.is_ok());
    }
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(serial.frames().len(), 6);
}
