//! Picolink device-communication core.
//!
//! Framed RPC over a serial byte stream and a single-client Wi-Fi TCP
//! listener.  The device exposes LED control, echo, sensor reads, a
//! periodic sensor stream and Wi-Fi credential provisioning.
//!
//! Hardware is reached only through the port traits in [`app::ports`]
//! and `embedded_hal::digital::OutputPin`; the simulated adapters in
//! [`adapters`] let the whole core run on a host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod rpc;
pub mod settings;
