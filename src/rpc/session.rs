//! Sensor stream session: periodic push into the open stream.
//!
//! Runs on its own `sensor-stream` thread.  Each cycle samples the paced
//! sensor (outside any stream lock) and pushes the reading through the
//! slot; the slot decides whether anyone is listening.
//!
//! Lock order inside a cycle: sensor → (released) → `StreamSlot` →
//! `OutputFanout`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::app::messages::SensorResponse;
use crate::app::sampler::SharedSensor;
use crate::error::{SensorError, TransportError};

use super::stream::{PushOutcome, StreamSlot};

/// What one [`StreamSession::cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// No stream open.
    Idle,
    /// The sensor read failed; the stream stays open.
    Skipped(SensorError),
    /// The sample could not be serialised; the stream stays open.
    EncodeFailed,
    Pushed(SensorResponse),
    /// The write failed; the stream was removed.
    WriterFailed(TransportError),
}

pub struct StreamSession {
    slot: Arc<StreamSlot>,
    sensor: SharedSensor,
    period: Duration,
}

impl StreamSession {
    pub fn new(slot: Arc<StreamSlot>, sensor: SharedSensor, period: Duration) -> Self {
        Self {
            slot,
            sensor,
            period,
        }
    }

    /// One sample-and-push step.
    pub fn cycle(&self) -> CycleOutcome {
        if !self.slot.is_active() {
            return CycleOutcome::Idle;
        }

        let reading = match self.sensor.read() {
            Ok(r) => SensorResponse::from(r),
            Err(e) => {
                debug!("Stream: sensor read failed, skipping cycle: {e}");
                return CycleOutcome::Skipped(e);
            }
        };

        let payload = match postcard::to_allocvec(&reading) {
            Ok(p) => p,
            Err(e) => {
                error!("Stream: encoding sample failed: {e}");
                return CycleOutcome::EncodeFailed;
            }
        };

        // The stream may have been stopped while the sensor was sampling.
        match self.slot.push(payload) {
            PushOutcome::Idle => CycleOutcome::Idle,
            PushOutcome::Pushed { generation } => {
                debug!(
                    "Stream #{generation}: Temp={:.2} C, Humidity={:.2} %",
                    reading.temperature, reading.humidity
                );
                CycleOutcome::Pushed(reading)
            }
            PushOutcome::Dropped(e) => {
                error!("Failed to write sensor stream response: {e}");
                CycleOutcome::WriterFailed(e)
            }
        }
    }

    /// Cycle forever, sleeping `period` after each step.
    pub fn run(&self) {
        info!("Stream: session running (period {} ms)", self.period.as_millis());
        loop {
            self.cycle();
            thread::sleep(self.period);
        }
    }

    /// Start [`run`](Self::run) on a thread named `sensor-stream`.
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("sensor-stream".into())
            .spawn(move || self.run())
    }
}
