//! Device service: the procedure handlers.
//!
//! [`DeviceService`] owns the LED pin and holds shared handles to the
//! paced sensor, the settings object and the sensor-stream slot.  It is
//! hardware-agnostic: every collaborator arrives through a port trait, so
//! the whole service runs against mocks in tests.
//!
//! ```text
//!  OutputPin ◀──┐
//!  SharedSensor ┼── DeviceService ──▶ Registry (practice.rpc.DeviceService)
//!  Settings ◀───┤
//!  StreamSlot ◀─┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, error, info, warn};

use crate::error::SettingsError;
use crate::rpc::packet::{Status, ids};
use crate::rpc::registry::{ProcedureId, RegistryBuilder};
use crate::rpc::stream::StreamSlot;
use crate::settings::Settings;

use super::messages::{EchoMessage, Empty, LedRequest, SensorRequest, SensorResponse, WifiSettings};
use super::sampler::SharedSensor;

pub struct DeviceService<P> {
    led: Mutex<P>,
    sensor: SharedSensor,
    settings: Arc<Settings>,
    stream: Arc<StreamSlot>,
}

impl<P> DeviceService<P>
where
    P: OutputPin + Send + 'static,
{
    pub fn new(led: P, sensor: SharedSensor, settings: Arc<Settings>, stream: Arc<StreamSlot>) -> Self {
        Self {
            led: Mutex::new(led),
            sensor,
            settings,
            stream,
        }
    }

    pub fn stream_slot(&self) -> &Arc<StreamSlot> {
        &self.stream
    }

    // ── Unary procedures ─────────────────────────────────────

    pub fn set_led(&self, request: LedRequest) -> Result<Empty, Status> {
        info!("LED {} requested", if request.on { "ON" } else { "OFF" });
        let mut led = self.led.lock().unwrap_or_else(PoisonError::into_inner);
        led.set_state(PinState::from(request.on)).map_err(|e| {
            error!("LED: pin write failed: {e:?}");
            Status::Internal
        })?;
        Ok(Empty {})
    }

    pub fn echo(&self, request: EchoMessage) -> Result<EchoMessage, Status> {
        info!("Echo requested: {}", request.msg);
        Ok(request)
    }

    /// Sample the sensor.
    ///
    /// Blocks for up to the sensor's minimum interval when called soon
    /// after a previous fetch (from this call or the stream session).
    pub fn get_sensor_data(&self, _request: SensorRequest) -> Result<SensorResponse, Status> {
        match self.sensor.read() {
            Ok(reading) => {
                debug!(
                    "Sensor data: Temp={:.2} C, Humidity={:.2} %",
                    reading.temperature_c, reading.humidity_pct
                );
                Ok(reading.into())
            }
            Err(e) => {
                error!("Failed to read from sensor: {e}");
                Err(Status::Internal)
            }
        }
    }

    pub fn stop_sensor_stream(&self, _request: Empty) -> Result<Empty, Status> {
        if self.stream.close(Status::Ok) {
            info!("Sensor streaming stopped");
        } else {
            debug!("Sensor streaming stop requested with no open stream");
        }
        Ok(Empty {})
    }

    pub fn configure_wifi(&self, request: WifiSettings) -> Result<Empty, Status> {
        info!("Configuring Wi-Fi: SSID={}", request.ssid);
        match self.settings.configure_wifi(&request.ssid, &request.password) {
            Ok(()) => Ok(Empty {}),
            Err(e @ (SettingsError::InvalidSsid | SettingsError::InvalidPassword)) => {
                warn!("Wi-Fi settings rejected: {e}");
                Err(Status::InvalidArgument)
            }
            Err(e @ SettingsError::Storage(_)) => {
                error!("Wi-Fi settings not saved: {e}");
                Err(Status::Internal)
            }
        }
    }

    // ── Registration ─────────────────────────────────────────

    /// Register every procedure of `practice.rpc.DeviceService`.
    #[must_use]
    pub fn register(self: Arc<Self>, builder: RegistryBuilder) -> RegistryBuilder {
        let id = |method: u32| ProcedureId::new(ids::DEVICE_SERVICE, method);
        let (s1, s2, s3, s4, s5) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        builder
            .unary(id(ids::SET_LED), move |r: LedRequest| s1.set_led(r))
            .unary(id(ids::ECHO), move |r: EchoMessage| s2.echo(r))
            .unary(id(ids::GET_SENSOR_DATA), move |r: SensorRequest| s3.get_sensor_data(r))
            .server_stream::<SensorRequest>(id(ids::START_SENSOR_STREAM), self.stream.clone())
            .unary(id(ids::STOP_SENSOR_STREAM), move |r: Empty| s4.stop_sensor_stream(r))
            .unary(id(ids::CONFIGURE_WIFI), move |r: WifiSettings| s5.configure_wifi(r))
    }
}
