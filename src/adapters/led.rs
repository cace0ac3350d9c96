//! Simulated status LED.
//!
//! Implements `embedded_hal::digital::OutputPin`; the level is shared
//! through an `Arc` so the host binary and tests can observe it.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use log::debug;

#[derive(Debug, Clone, Default)]
pub struct SimLed {
    level: Arc<AtomicBool>,
}

impl SimLed {
    /// New LED, initially low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer sharing this LED's level.
    pub fn probe(&self) -> LedProbe {
        LedProbe(self.level.clone())
    }
}

impl ErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::SeqCst);
        debug!("LED(sim): off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::SeqCst);
        debug!("LED(sim): on");
        Ok(())
    }
}

impl StatefulOutputPin for SimLed {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::SeqCst))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::SeqCst))
    }
}

/// Read-only view of a [`SimLed`].
#[derive(Debug, Clone)]
pub struct LedProbe(Arc<AtomicBool>);

impl LedProbe {
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
