//! Application core: the device procedures and their collaborators.
//!
//! Handlers in [`service`] are hardware-agnostic.  All interaction with
//! hardware happens through the **port traits** in [`ports`], keeping this
//! layer testable without real peripherals.

pub mod messages;
pub mod ports;
pub mod sampler;
pub mod service;
