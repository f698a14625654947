use crate::error::{EncoderError, EncoderResult};

/// Default baud rate for setting circle boxes.
pub const DEFAULT_SERIAL_SPEED: u32 = 9600;

/// Per-axis encoder configuration handed to a driver at construction.
///
/// Resolutions are steps per revolution and are always strictly positive;
/// the pointing math divides by them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    res_alt: u32,
    res_az: u32,
    reverse_alt: bool,
    reverse_az: bool,
    port: String,
    speed: u32,
}

impl EncoderConfig {
    /// Create a configuration with the given resolutions.
    ///
    /// Returns a configuration error if either resolution is zero.
    pub fn new(res_alt: u32, res_az: u32) -> EncoderResult<Self> {
        if res_alt == 0 || res_az == 0 {
            return Err(EncoderError::Config(format!(
                "encoder resolution must be positive (alt={res_alt}, az={res_az})"
            )));
        }
        Ok(Self {
            res_alt,
            res_az,
            reverse_alt: false,
            reverse_az: false,
            port: String::new(),
            speed: DEFAULT_SERIAL_SPEED,
        })
    }

    pub fn with_reversal(mut self, reverse_alt: bool, reverse_az: bool) -> Self {
        self.reverse_alt = reverse_alt;
        self.reverse_az = reverse_az;
        self
    }

    pub fn with_port(mut self, port: impl Into<String>, speed: u32) -> Self {
        self.port = port.into();
        self.speed = speed;
        self
    }

    pub fn res_alt(&self) -> u32 {
        self.res_alt
    }

    pub fn res_az(&self) -> u32 {
        self.res_az
    }

    pub fn reverse_alt(&self) -> bool {
        self.reverse_alt
    }

    pub fn reverse_az(&self) -> bool {
        self.reverse_az
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }
}
