//! Simulated DHT22 temperature / humidity sensor.
//!
//! Produces a slow deterministic oscillation around a baseline so stream
//! output is recognisable.  A [`SimDht22Control`] handle can queue
//! failing fetches from another thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::app::ports::{SensorReading, SensorSource};
use crate::error::SensorError;

/// Driver return code for a checksum / timing failure.
const EIO: i32 = -5;

#[derive(Debug, Default)]
pub struct SimDht22Control {
    fetches: AtomicU32,
    failures_queued: AtomicU32,
}

impl SimDht22Control {
    /// Fetches attempted so far, including failed ones.
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make the next `n` fetches fail.
    pub fn fail_next(&self, n: u32) {
        self.failures_queued.store(n, Ordering::SeqCst);
    }
}

pub struct SimDht22 {
    temperature_c: f32,
    humidity_pct: f32,
    control: Arc<SimDht22Control>,
}

impl SimDht22 {
    pub fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            control: Arc::new(SimDht22Control::default()),
        }
    }

    pub fn control(&self) -> Arc<SimDht22Control> {
        self.control.clone()
    }
}

impl Default for SimDht22 {
    fn default() -> Self {
        Self::new(22.5, 45.0)
    }
}

impl SensorSource for SimDht22 {
    fn read(&mut self) -> Result<SensorReading, SensorError> {
        let n = self.control.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .control
            .failures_queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |q| q.checked_sub(1))
            .is_ok();
        if failing {
            debug!("DHT22(sim): fetch #{n} failed");
            return Err(SensorError::FetchFailed(EIO));
        }

        // Triangle wave, period 20 samples, ±0.5 °C / ±2 %.
        let phase = (n % 20) as f32;
        let rising = if phase < 10.0 { phase } else { 20.0 - phase };
        let tri = rising / 10.0 - 0.5;
        // DHT22 resolution is 0.1.
        let round = |v: f32| (v * 10.0).round() / 10.0;
        Ok(SensorReading {
            temperature_c: round(self.temperature_c + tri),
            humidity_pct: round((self.humidity_pct + tri * 4.0).clamp(0.0, 100.0)),
        })
    }
}
