//! Network attachment: Wi-Fi association, IP wait and the TCP listener.
//!
//! ```text
//!  Disconnected ──▶ Connecting ──▶ WaitingForIp ──▶ Ready
//!       ▲               │  ▲                          │
//!       │               └──┘ hard failure / timeout   │
//!       └─────────────────── link lost ───────────────┘
//! ```
//!
//! Runs on the `rpc-net` thread.  Connect attempts snapshot the shared
//! [`Settings`], so a `ConfigureWifi` call takes effect on the next
//! attempt.  Retries are unbounded unless
//! [`NetworkConfig::max_connect_attempts`] is set.
//!
//! The listener serves one client at a time.  While a client is
//! connected its write half is attached to the
//! [`OutputFanout`](crate::rpc::fanout::OutputFanout) and its
//! read half feeds a dedicated [`Ingest`]; when it disconnects the
//! listener goes back to accepting.

use std::io::{self, ErrorKind, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::app::ports::{AssociateError, LinkState, WifiDriver};
use crate::config::NetworkConfig;
use crate::error::ConnectivityError;
use crate::rpc::engine::DispatchEngine;
use crate::rpc::ingest::Ingest;
use crate::rpc::transport::Link;
use crate::settings::Settings;

const TCP_READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    WaitingForIp,
    Ready,
}

// ───────────────────────────────────────────────────────────────
// Observable state
// ───────────────────────────────────────────────────────────────

struct Observed {
    state: ConnectionState,
    listening: Option<SocketAddr>,
    client: Option<SocketAddr>,
}

/// Cloneable read handle on the attachment's state.
#[derive(Clone)]
pub struct NetworkWatch {
    inner: Arc<(Mutex<Observed>, Condvar)>,
}

impl NetworkWatch {
    fn new() -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(Observed {
                    state: ConnectionState::Disconnected,
                    listening: None,
                    client: None,
                }),
                Condvar::new(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Observed> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Observed)) {
        f(&mut self.lock());
        self.inner.1.notify_all();
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Address the listener is bound to while serving.
    pub fn listening_addr(&self) -> Option<SocketAddr> {
        self.lock().listening
    }

    /// Peer of the currently attached TCP client.
    pub fn client(&self) -> Option<SocketAddr> {
        self.lock().client
    }

    /// Block until `pred` holds or `timeout` elapses.  Returns whether it
    /// held.
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(ConnectionState, Option<SocketAddr>) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if pred(guard.state, guard.client) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .1
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkAttachment
// ───────────────────────────────────────────────────────────────

pub struct NetworkAttachment<W> {
    wifi: W,
    settings: Arc<Settings>,
    config: NetworkConfig,
    engine: Arc<DispatchEngine>,
    rpc_address: u8,
    bind_ip: IpAddr,
    watch: NetworkWatch,
}

impl<W: WifiDriver + 'static> NetworkAttachment<W> {
    pub fn new(
        wifi: W,
        settings: Arc<Settings>,
        config: NetworkConfig,
        engine: Arc<DispatchEngine>,
        rpc_address: u8,
    ) -> Self {
        Self {
            wifi,
            settings,
            config,
            engine,
            rpc_address,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            watch: NetworkWatch::new(),
        }
    }

    /// Bind the listener to `ip` instead of all interfaces.
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn watch(&self) -> NetworkWatch {
        self.watch.clone()
    }

    fn set_state(&self, state: ConnectionState) {
        self.watch.update(|o| o.state = state);
    }

    /// Associate with the configured network.
    ///
    /// Returns the number of attempts used.  Fails only when
    /// `max_connect_attempts` is set and reached.
    pub fn associate(&mut self) -> Result<u32, ConnectivityError> {
        let mut attempts = 0u32;
        loop {
            if self.config.max_connect_attempts.is_some_and(|max| attempts >= max) {
                error!("WiFi: giving up after {attempts} attempts");
                self.set_state(ConnectionState::Disconnected);
                return Err(ConnectivityError::RetriesExhausted { attempts });
            }
            attempts += 1;
            self.set_state(ConnectionState::Connecting);

            self.wifi.disassociate();
            thread::sleep(self.config.disassociate_pause());

            let credentials = self.settings.credentials();
            info!("WiFi: preparing to connect: SSID={}", credentials.ssid);
            info!("WiFi: requesting connection (attempt {attempts})...");
            match self.wifi.associate(&credentials) {
                Ok(()) | Err(AssociateError::InProgress) => {}
                Err(e @ AssociateError::Failed(_)) => {
                    error!("WiFi: initial request failed ({e}), retrying...");
                    thread::sleep(self.config.associate_backoff());
                    continue;
                }
            }

            for _ in 0..self.config.status_polls {
                let link = self.wifi.link_state();
                info!("WiFi: checking state: {link:?}");
                if link == LinkState::Associated {
                    self.set_state(ConnectionState::WaitingForIp);
                    return Ok(attempts);
                }
                thread::sleep(self.config.status_poll_interval());
            }
            error!("WiFi: connection timeout, resetting...");
        }
    }

    /// Poll until an IPv4 address is assigned.  Unbounded.
    pub fn wait_for_ip(&mut self) -> Ipv4Addr {
        info!("NET: waiting for IP address...");
        let every = self.config.ip_progress_every.max(1);
        let mut polls = 0u32;
        loop {
            if let Some(ip) = self.wifi.ipv4_address() {
                info!("NET: IP assigned: {ip}");
                self.set_state(ConnectionState::Ready);
                return ip;
            }
            if polls % every == 0 && polls > 0 {
                info!("NET: still waiting for IP address...");
            }
            polls = polls.wrapping_add(1);
            thread::sleep(self.config.ip_poll_interval());
        }
    }

    /// Single-client accept loop.  Returns when the Wi-Fi link drops.
    pub fn serve(&mut self, listener: &TcpListener) -> ConnectivityError {
        if let Err(e) = listener.set_nonblocking(true) {
            warn!("NET: listener cannot poll ({e})");
        }
        loop {
            match listener.accept() {
                Ok((stream, peer)) => self.handle_client(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => warn!("NET: accept failed: {e}"),
            }
            if self.wifi.link_state() != LinkState::Associated {
                warn!("WiFi: link lost");
                self.set_state(ConnectionState::Disconnected);
                return ConnectivityError::LinkLost;
            }
            thread::sleep(self.config.accept_poll_interval());
        }
    }

    fn handle_client(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = configure_client(&stream, self.config.write_timeout()) {
            warn!("NET: dropping client {peer}: {e}");
            return;
        }
        let writer = match stream.try_clone() {
            Ok(w) => w,
            Err(e) => {
                warn!("NET: dropping client {peer}: {e}");
                return;
            }
        };

        let fanout = self.engine.fanout();
        fanout.attach_tcp(Box::new(ClientWriter(writer)));
        self.watch.update(|o| o.client = Some(peer));
        info!("NET: client connected: {peer}");

        let mut ingest = Ingest::new(&self.engine, Link::Tcp, self.rpc_address);
        let result = ingest.run(&stream, TCP_READ_CHUNK);

        fanout.detach_tcp();
        self.watch.update(|o| o.client = None);
        match result {
            Ok(()) => info!("NET: client disconnected"),
            Err(e) => warn!("NET: client {peer} read error: {e}"),
        }
    }

    /// Associate → wait for IP → listen → serve, forever.
    ///
    /// Returns only when the connect-attempt ceiling is reached.
    pub fn run(mut self) -> ConnectivityError {
        info!("NET: starting Wi-Fi connection process");
        loop {
            if let Err(e) = self.associate() {
                return e;
            }
            self.wait_for_ip();

            let addr = SocketAddr::new(self.bind_ip, self.config.port);
            let listener = match TcpListener::bind(addr) {
                Ok(l) => l,
                Err(e) => {
                    error!("NET: {}", ConnectivityError::Bind(e.kind()));
                    self.set_state(ConnectionState::Disconnected);
                    thread::sleep(self.config.associate_backoff());
                    continue;
                }
            };
            let local = listener.local_addr().ok();
            self.watch.update(|o| o.listening = local);
            info!("NET: RPC listener on {}", local.unwrap_or(addr));

            let reason = self.serve(&listener);
            drop(listener);
            self.watch.update(|o| o.listening = None);
            warn!("NET: {reason}, reattaching");
        }
    }

    /// Start [`run`](Self::run) on a thread named `rpc-net`.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<ConnectivityError>> {
        thread::Builder::new()
            .name("rpc-net".into())
            .spawn(move || self.run())
    }
}

/// Write half of the connected client as attached to the fan-out.
///
/// Dropping it shuts the socket down, so a client detached after a failed
/// write also ends the read loop serving it.
struct ClientWriter(TcpStream);

impl Write for ClientWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Drop for ClientWriter {
    fn drop(&mut self) {
        // Dropped under the fan-out lock: must not log.
        self.0.shutdown(Shutdown::Both).ok();
    }
}

fn configure_client(stream: &TcpStream, write_timeout: Duration) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(write_timeout).filter(|d| !d.is_zero()))
}
