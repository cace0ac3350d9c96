//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the device
//! core against the simulated adapters.  Everything runs on the host; the
//! network tests bind loopback listeners on ephemeral ports.

mod dispatch_tests;
mod fanout_tests;
mod log_tests;
mod mock_hw;
mod network_tests;
mod stream_tests;
