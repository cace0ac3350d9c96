//! Frame log sink: `log` records as frames on the log address.
//!
//! Implements [`log::Log`] by encoding every enabled record as a
//! [`LogRecord`] and broadcasting it through [`OutputFanout::send`], so
//! diagnostics reach the serial host and any attached TCP client
//! alongside RPC traffic.  Delivery failures are swallowed.
//!
//! A log call made while this thread is already inside the sink (e.g.
//! from a transport write) is dropped rather than recursing.

use core::cell::Cell;
use std::io::Write;
use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::{Deserialize, Serialize};

use crate::rpc::codec::MAX_PAYLOAD_SIZE;
use crate::rpc::fanout::OutputFanout;

/// Longest message carried in one record; the rest is cut.
const MAX_MESSAGE_LEN: usize = MAX_PAYLOAD_SIZE - 128;

/// Wire form of one log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 1 = error … 5 = trace.
    pub level: u8,
    pub target: String,
    pub message: String,
}

impl LogRecord {
    pub fn level(&self) -> Option<log::Level> {
        match self.level {
            1 => Some(log::Level::Error),
            2 => Some(log::Level::Warn),
            3 => Some(log::Level::Info),
            4 => Some(log::Level::Debug),
            5 => Some(log::Level::Trace),
            _ => None,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

thread_local! {
    static IN_SINK: Cell<bool> = const { Cell::new(false) };
}

pub struct FrameLogger {
    fanout: Arc<OutputFanout>,
    address: u8,
    max_level: LevelFilter,
    mirror_stderr: bool,
}

impl FrameLogger {
    pub fn new(fanout: Arc<OutputFanout>, address: u8, max_level: LevelFilter) -> Self {
        Self {
            fanout,
            address,
            max_level,
            mirror_stderr: false,
        }
    }

    /// Also print every record to stderr.
    #[must_use]
    pub fn mirror_to_stderr(mut self, on: bool) -> Self {
        self.mirror_stderr = on;
        self
    }

    /// Install as the global logger.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.max_level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn encode(record: &Record<'_>) -> Option<Vec<u8>> {
        let mut message = record.args().to_string();
        if message.len() > MAX_MESSAGE_LEN {
            let mut cut = MAX_MESSAGE_LEN;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        let entry = LogRecord {
            level: record.level() as u8,
            target: record.target().chars().take(64).collect(),
            message,
        };
        postcard::to_allocvec(&entry).ok()
    }
}

impl Log for FrameLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if IN_SINK.with(|busy| busy.replace(true)) {
            return;
        }

        if self.mirror_stderr {
            let _ = writeln!(
                std::io::stderr(),
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
        if let Some(payload) = Self::encode(record) {
            let _ = self.fanout.send(self.address, &payload);
        }

        IN_SINK.with(|busy| busy.set(false));
    }

    fn flush(&self) {}
}
