//! Simulated station-mode Wi-Fi radio.
//!
//! Implements [`WifiDriver`] for host runs and tests.  The simulation
//! follows the shape of a real radio: an association request is accepted
//! immediately, the link reports `Associated` only after a number of
//! status polls, and DHCP hands out an address after a further number of
//! address polls.
//!
//! ## Credential behaviour
//!
//! - No network configured: any credentials associate.
//! - Wrong SSID: the request is accepted but the radio keeps scanning.
//! - Wrong password: the radio stays in `Authenticating`.
//!
//! A [`SimWifiControl`] handle lets tests observe attempts and inject a
//! link drop from another thread.

use core::cell::Cell;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::info;

use crate::app::ports::{AssociateError, LinkState, WifiDriver};
use crate::settings::WifiCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Request accepted; `polls` status polls left until associated.
    Joining { polls: u32 },
    /// Credentials never complete.
    Stuck(LinkState),
    /// `polls` address polls left until DHCP answers.
    Associated { polls: u32 },
}

/// Shared observation / fault-injection handle.
#[derive(Debug, Default)]
pub struct SimWifiControl {
    associate_calls: AtomicU32,
    drop_pending: AtomicBool,
}

impl SimWifiControl {
    pub fn associate_calls(&self) -> u32 {
        self.associate_calls.load(Ordering::SeqCst)
    }

    /// Drop the association at the next link-status poll.
    pub fn drop_link(&self) {
        self.drop_pending.store(true, Ordering::SeqCst);
    }
}

pub struct SimWifiDriver {
    network: Option<WifiCredentials>,
    polls_to_associate: u32,
    polls_to_ip: u32,
    address: Ipv4Addr,
    phase: Cell<Phase>,
    control: Arc<SimWifiControl>,
}

impl SimWifiDriver {
    /// Radio that joins any network.
    pub fn permissive() -> Self {
        Self {
            network: None,
            polls_to_associate: 1,
            polls_to_ip: 1,
            address: Ipv4Addr::new(192, 168, 4, 2),
            phase: Cell::new(Phase::Idle),
            control: Arc::new(SimWifiControl::default()),
        }
    }

    /// Radio that only joins `network`.
    pub fn for_network(network: WifiCredentials) -> Self {
        Self {
            network: Some(network),
            ..Self::permissive()
        }
    }

    /// Status polls before `Associated` and address polls before DHCP.
    #[must_use]
    pub fn with_timing(mut self, polls_to_associate: u32, polls_to_ip: u32) -> Self {
        self.polls_to_associate = polls_to_associate;
        self.polls_to_ip = polls_to_ip;
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }

    pub fn control(&self) -> Arc<SimWifiControl> {
        self.control.clone()
    }
}

impl WifiDriver for SimWifiDriver {
    fn disassociate(&mut self) {
        if self.phase.get() != Phase::Idle {
            info!("WiFi(sim): disassociated");
        }
        self.phase.set(Phase::Idle);
    }

    fn associate(&mut self, credentials: &WifiCredentials) -> Result<(), AssociateError> {
        self.control.associate_calls.fetch_add(1, Ordering::SeqCst);
        if !matches!(self.phase.get(), Phase::Idle) {
            return Err(AssociateError::InProgress);
        }
        let phase = match &self.network {
            Some(net) if net.ssid != credentials.ssid => Phase::Stuck(LinkState::Scanning),
            Some(net) if net.password != credentials.password => {
                Phase::Stuck(LinkState::Authenticating)
            }
            _ => Phase::Joining {
                polls: self.polls_to_associate,
            },
        };
        self.phase.set(phase);
        Ok(())
    }

    fn link_state(&self) -> LinkState {
        if self.control.drop_pending.swap(false, Ordering::SeqCst) {
            info!("WiFi(sim): link dropped");
            self.phase.set(Phase::Idle);
        }
        match self.phase.get() {
            Phase::Idle => LinkState::Disconnected,
            Phase::Stuck(state) => state,
            Phase::Joining { polls: 0 } => {
                self.phase.set(Phase::Associated {
                    polls: self.polls_to_ip,
                });
                LinkState::Associated
            }
            Phase::Joining { polls } => {
                self.phase.set(Phase::Joining { polls: polls - 1 });
                LinkState::Associating
            }
            Phase::Associated { .. } => LinkState::Associated,
        }
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        match self.phase.get() {
            Phase::Associated { polls: 0 } => Some(self.address),
            Phase::Associated { polls } => {
                self.phase.set(Phase::Associated { polls: polls - 1 });
                None
            }
            _ => None,
        }
    }
}
