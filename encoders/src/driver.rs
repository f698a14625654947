use crate::config::EncoderConfig;
use crate::error::EncoderResult;

/// One poll of the raw axis counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderReading {
    pub alt_raw: i64,
    pub az_raw: i64,
}

impl EncoderReading {
    pub fn new(alt_raw: i64, az_raw: i64) -> Self {
        Self { alt_raw, az_raw }
    }
}

/// Capability shared by every encoder box driver.
///
/// Drivers are owned by the device state and only touched while its lock
/// is held, so they need `Send` but not `Sync`.
pub trait EncoderDriver: Send {
    /// Stable identifier used for profile lookup and registry keying.
    fn name(&self) -> &'static str;

    /// Configuration the driver was constructed with.
    fn config(&self) -> &EncoderConfig;

    /// Open the transport and push the configured resolution to the hardware.
    ///
    /// On any failure the transport is left closed.
    fn connect(&mut self, port: &str, speed: u32) -> EncoderResult<()>;

    /// Release the transport. Safe to call repeatedly.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Read raw (alt, az) counts.
    fn get_encoder_position(&mut self) -> EncoderResult<EncoderReading>;

    /// Read the (alt, az) resolution, in steps per revolution, reported by the hardware.
    fn get_encoder_resolution(&mut self) -> EncoderResult<(i64, i64)>;

    /// Program the hardware with a new (alt, az) resolution.
    fn set_encoder_resolution(&mut self, res_alt: i64, res_az: i64) -> EncoderResult<()>;
}
