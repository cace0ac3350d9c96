//! Minimum-interval pacing for the ambient sensor.
//!
//! The DHT22 must not be sampled more often than every two seconds.  The
//! one-shot `GetSensorData` call and the streaming session share a single
//! [`RateLimitedSensor`] so the interval holds across both paths; a caller
//! that arrives early sleeps for the remainder.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SensorError;

use super::ports::{SensorReading, SensorSource};

pub struct RateLimitedSensor {
    source: Box<dyn SensorSource>,
    min_interval: Duration,
    last_fetch: Option<Instant>,
}

impl RateLimitedSensor {
    pub fn new(source: Box<dyn SensorSource>, min_interval: Duration) -> Self {
        Self {
            source,
            min_interval,
            last_fetch: None,
        }
    }

    /// Time until the next fetch is allowed.
    pub fn remaining(&self) -> Duration {
        self.last_fetch
            .map(|t| self.min_interval.saturating_sub(t.elapsed()))
            .unwrap_or_default()
    }

    /// Fetch one sample, first sleeping out the minimum interval.
    ///
    /// A failed fetch still counts toward the interval.
    pub fn read(&mut self) -> Result<SensorReading, SensorError> {
        let wait = self.remaining();
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.last_fetch = Some(Instant::now());
        self.source.read()
    }
}

/// Handle shared between the service and the stream session.
#[derive(Clone)]
pub struct SharedSensor(Arc<Mutex<RateLimitedSensor>>);

impl SharedSensor {
    pub fn new(sensor: RateLimitedSensor) -> Self {
        Self(Arc::new(Mutex::new(sensor)))
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitedSensor> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Paced read; blocks up to the minimum interval.
    pub fn read(&self) -> Result<SensorReading, SensorError> {
        self.lock().read()
    }
}
