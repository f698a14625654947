//! Dave Ek's binary setting circle protocol.
//!
//! Single-byte commands, fixed 4-byte replies holding two little-endian
//! u16 counts (alt then az).

use tracing::info;

use crate::config::EncoderConfig;
use crate::driver::{EncoderDriver, EncoderReading};
use crate::error::{EncoderError, EncoderResult};
use crate::transport::{ByteLink, SerialTransport};

const CMD_POSITION: u8 = b'y';
const CMD_GET_RESOLUTION: u8 = b'h';
const CMD_SET_RESOLUTION: u8 = b'z';
const REPLY_LEN: usize = 4;

/// Decode a 4-byte reply into (alt, az) counts.
pub fn decode_counts(reply: &[u8]) -> EncoderResult<(u16, u16)> {
    if reply.len() != REPLY_LEN {
        return Err(EncoderError::Protocol(format!(
            "expected {REPLY_LEN} byte reply, got {}",
            reply.len()
        )));
    }
    let alt = u16::from_le_bytes([reply[0], reply[1]]);
    let az = u16::from_le_bytes([reply[2], reply[3]]);
    Ok((alt, az))
}

fn encode_resolution(value: i64) -> EncoderResult<[u8; 2]> {
    match u16::try_from(value) {
        Ok(v) if v > 0 => Ok(v.to_le_bytes()),
        _ => Err(EncoderError::Config(format!(
            "resolution {value} outside 1..=65535"
        ))),
    }
}

pub struct DaveEkEncoders {
    config: EncoderConfig,
    transport: SerialTransport,
}

impl DaveEkEncoders {
    pub const NAME: &'static str = "DaveEk";

    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            transport: SerialTransport::new(),
        }
    }

    /// Connect over an already-open link and push the configured resolution.
    pub fn connect_link(&mut self, link: Box<dyn ByteLink>) -> EncoderResult<()> {
        self.transport.attach(link);
        self.push_resolution()
    }

    fn push_resolution(&mut self) -> EncoderResult<()> {
        let (res_alt, res_az) = (
            i64::from(self.config.res_alt()),
            i64::from(self.config.res_az()),
        );
        if let Err(e) = self.set_encoder_resolution(res_alt, res_az) {
            self.transport.close();
            return Err(e);
        }
        Ok(())
    }

    fn query(&mut self, command: u8) -> EncoderResult<(u16, u16)> {
        self.transport.write_all(&[command])?;
        let reply = self.transport.read_up_to(REPLY_LEN)?;
        decode_counts(&reply)
    }
}

impl EncoderDriver for DaveEkEncoders {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn connect(&mut self, port: &str, speed: u32) -> EncoderResult<()> {
        self.transport.open(port, speed)?;
        self.push_resolution()?;
        info!(
            "DaveEk encoders connected on {port} (res {}x{})",
            self.config.res_alt(),
            self.config.res_az()
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        self.transport.close();
    }

    fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    fn get_encoder_position(&mut self) -> EncoderResult<EncoderReading> {
        let (alt, az) = self.query(CMD_POSITION)?;
        Ok(EncoderReading::new(i64::from(alt), i64::from(az)))
    }

    fn get_encoder_resolution(&mut self) -> EncoderResult<(i64, i64)> {
        let (alt, az) = self.query(CMD_GET_RESOLUTION)?;
        Ok((i64::from(alt), i64::from(az)))
    }

    fn set_encoder_resolution(&mut self, res_alt: i64, res_az: i64) -> EncoderResult<()> {
        let alt = encode_resolution(res_alt)?;
        let az = encode_resolution(res_az)?;
        let frame = [CMD_SET_RESOLUTION, alt[0], alt[1], az[0], az[1]];
        self.transport.write_all(&frame)
    }
}
