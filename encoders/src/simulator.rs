//! Encoder driver without hardware.
//!
//! Counts live behind a cloneable [`SimulatorHandle`] so tests and the
//! monitor can move the "telescope" or inject read failures while the
//! driver is owned by the device.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::config::EncoderConfig;
use crate::driver::{EncoderDriver, EncoderReading};
use crate::error::{EncoderError, EncoderResult};

/// Counts reported until something moves the simulated axes.
pub const SIMULATOR_DEFAULT_COUNTS: (i64, i64) = (2000, 2000);

#[derive(Debug)]
struct SimState {
    position: EncoderReading,
    resolution: (i64, i64),
    fail_reads: bool,
}

/// Shared control surface for a simulated encoder box.
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatorHandle {
    pub fn new() -> Self {
        let (alt, az) = SIMULATOR_DEFAULT_COUNTS;
        Self {
            state: Arc::new(Mutex::new(SimState {
                position: EncoderReading::new(alt, az),
                resolution: (0, 0),
                fail_reads: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_position(&self, alt_raw: i64, az_raw: i64) {
        self.state().position = EncoderReading::new(alt_raw, az_raw);
    }

    /// Move both axes by the given number of counts.
    pub fn step(&self, d_alt: i64, d_az: i64) {
        let mut state = self.state();
        state.position.alt_raw += d_alt;
        state.position.az_raw += d_az;
    }

    pub fn position(&self) -> EncoderReading {
        self.state().position
    }

    /// Resolution last programmed by the driver; (0, 0) before any connect.
    pub fn resolution(&self) -> (i64, i64) {
        self.state().resolution
    }

    /// Make position and resolution reads fail with a timeout.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }
}

impl Default for SimulatorHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SimulatorEncoders {
    config: EncoderConfig,
    handle: SimulatorHandle,
    connected: bool,
}

impl SimulatorEncoders {
    pub const NAME: &'static str = "Simulator";

    pub fn new(config: EncoderConfig) -> Self {
        Self::with_handle(config, SimulatorHandle::new())
    }

    pub fn with_handle(config: EncoderConfig, handle: SimulatorHandle) -> Self {
        Self {
            config,
            handle,
            connected: false,
        }
    }

    pub fn handle(&self) -> SimulatorHandle {
        self.handle.clone()
    }

    fn ensure_readable(&self) -> EncoderResult<()> {
        if !self.connected {
            return Err(EncoderError::NotConnected);
        }
        if self.handle.state().fail_reads {
            return Err(EncoderError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "simulated read timeout",
            )));
        }
        Ok(())
    }
}

impl EncoderDriver for SimulatorEncoders {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn connect(&mut self, port: &str, _speed: u32) -> EncoderResult<()> {
        self.connected = true;
        let (res_alt, res_az) = (
            i64::from(self.config.res_alt()),
            i64::from(self.config.res_az()),
        );
        self.set_encoder_resolution(res_alt, res_az)?;
        info!("Simulated encoders connected (port {port:?} ignored)");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn get_encoder_position(&mut self) -> EncoderResult<EncoderReading> {
        self.ensure_readable()?;
        let reading = self.handle.position();
        debug!("simulated counts {reading:?}");
        Ok(reading)
    }

    fn get_encoder_resolution(&mut self) -> EncoderResult<(i64, i64)> {
        self.ensure_readable()?;
        Ok(self.handle.resolution())
    }

    fn set_encoder_resolution(&mut self, res_alt: i64, res_az: i64) -> EncoderResult<()> {
        if !self.connected {
            return Err(EncoderError::NotConnected);
        }
        self.handle.state().resolution = (res_alt, res_az);
        Ok(())
    }
}
