//! Wi-Fi attach and the single-client TCP listener.

pub mod attach;

pub use attach::{ConnectionState, NetworkAttachment, NetworkWatch};
