//! Wi-Fi attach and the TCP link, end to end on loopback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use picolink::adapters::wifi::SimWifiDriver;
use picolink::client::{RpcClient, StreamEvent};
use picolink::config::NetworkConfig;
use picolink::error::ConnectivityError;
use picolink::net::{ConnectionState, NetworkAttachment, NetworkWatch};
use picolink::rpc::codec::RPC_ADDRESS;
use picolink::rpc::session::StreamSession;
use picolink::settings::WifiCredentials;

use crate::mock_hw::Device;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> NetworkConfig {
    NetworkConfig {
        port: 0,
        disassociate_pause_ms: 0,
        associate_backoff_ms: 0,
        status_polls: 3,
        status_poll_interval_ms: 1,
        ip_poll_interval_ms: 1,
        accept_poll_interval_ms: 1,
        ..NetworkConfig::default()
    }
}

fn attach(dev: &Device, wifi: SimWifiDriver, config: NetworkConfig) -> NetworkAttachment<SimWifiDriver> {
    NetworkAttachment::new(wifi, dev.settings.clone(), config, dev.engine.clone(), RPC_ADDRESS)
        .with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn eventually(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn listening(watch: &NetworkWatch) -> SocketAddr {
    assert!(
        eventually(|| watch.state() == ConnectionState::Ready && watch.listening_addr().is_some()),
        "listener never came up (state {:?})",
        watch.state()
    );
    watch.listening_addr().unwrap()
}

fn connect(addr: SocketAddr) -> RpcClient<TcpStream> {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(WAIT)).unwrap();
    RpcClient::new(stream)
}

#[test]
fn tcp_client_calls_every_procedure() {
    let dev = Device::new();
    StreamSession::new(dev.slot.clone(), dev.sensor.clone(), Duration::from_millis(5))
        .spawn()
        .unwrap();
    let net = attach(&dev, SimWifiDriver::permissive(), fast_config());
    let watch = net.watch();
    net.spawn().unwrap();

    let mut client = connect(listening(&watch));
    assert!(watch.wait_until(WAIT, |_, client| client.is_some()));

    assert_eq!(client.echo("hi").unwrap(), "hi");
    client.set_led(true).unwrap();
    assert!(dev.led.is_on());
    let sample = client.get_sensor_data().unwrap();
    assert!(sample.temperature > 0.0);

    let call_id = client.start_sensor_stream().unwrap();
    for _ in 0..2 {
        assert!(matches!(
            client.next_sensor_sample(call_id).unwrap(),
            StreamEvent::Item(_)
        ));
    }
    client.stop_sensor_stream().unwrap();
    assert!(!dev.slot.is_active());

    client.configure_wifi("Home", "password1").unwrap();
    assert_eq!(dev.settings.credentials().ssid.as_str(), "Home");

    // Nothing addressed to the TCP client leaked onto serial.
    assert!(dev.serial.packets().is_empty());
}

#[test]
fn client_can_reconnect_after_disconnect() {
    let dev = Device::new();
    let net = attach(&dev, SimWifiDriver::permissive(), fast_config());
    let watch = net.watch();
    net.spawn().unwrap();
    let addr = listening(&watch);

    let mut first = connect(addr);
    assert_eq!(first.echo("one").unwrap(), "one");
    drop(first);
    assert!(watch.wait_until(WAIT, |_, client| client.is_none()));
    assert_eq!(watch.state(), ConnectionState::Ready);

    let mut second = connect(addr);
    assert_eq!(second.echo("two").unwrap(), "two");
}

#[test]
fn wrong_credentials_exhaust_the_retry_ceiling() {
    let dev = Device::new();
    let wifi = SimWifiDriver::for_network(WifiCredentials::new("Home", "password1").unwrap());
    let control = wifi.control();
    let config = NetworkConfig {
        max_connect_attempts: Some(3),
        ..fast_config()
    };
    let net = attach(&dev, wifi, config);
    let watch = net.watch();

    assert_eq!(net.run(), ConnectivityError::RetriesExhausted { attempts: 3 });
    assert_eq!(control.associate_calls(), 3);
    assert_eq!(watch.state(), ConnectionState::Disconnected);
}

#[test]
fn provisioning_new_credentials_completes_attach() {
    let dev = Device::new();
    let wifi = SimWifiDriver::for_network(WifiCredentials::new("Home", "password1").unwrap());
    let control = wifi.control();
    let net = attach(&dev, wifi, fast_config());
    let watch = net.watch();
    net.spawn().unwrap();

    assert!(eventually(|| control.associate_calls() >= 3));
    assert_eq!(watch.state(), ConnectionState::Connecting);

    dev.settings.configure_wifi("Home", "password1").unwrap();
    listening(&watch);
}

#[test]
fn link_drop_reattaches() {
    let dev = Device::new();
    let wifi = SimWifiDriver::permissive();
    let control = wifi.control();
    let net = attach(&dev, wifi, fast_config());
    let watch = net.watch();
    net.spawn().unwrap();
    listening(&watch);
    assert_eq!(control.associate_calls(), 1);

    control.drop_link();
    assert!(eventually(|| control.associate_calls() >= 2));
    let addr = listening(&watch);
    assert_eq!(connect(addr).echo("back").unwrap(), "back");
}
