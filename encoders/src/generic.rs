//! ASCII protocol spoken by BBox, Intelliscope and NGCMax style boxes.

use tracing::info;

use crate::config::EncoderConfig;
use crate::driver::{EncoderDriver, EncoderReading};
use crate::error::{EncoderError, EncoderResult};
use crate::transport::{ByteLink, SerialTransport};

const CMD_POSITION: &[u8] = b"Q\r\n";
const CMD_GET_RESOLUTION: &[u8] = b"H\r\n";
const REPLY_TERMINATOR: u8 = b'\r';
const ACK: u8 = b'*';

/// Build the set-resolution line, e.g. `Z+4000 +8192\r\n`.
pub fn format_resolution_command(res_alt: i64, res_az: i64) -> String {
    format!("Z{res_alt:+} {res_az:+}\r\n")
}

/// Parse a `<alt>\t<az>\r` reply into two integers.
pub fn parse_counts_reply(reply: &[u8]) -> EncoderResult<(i64, i64)> {
    if reply.last() != Some(&REPLY_TERMINATOR) {
        return Err(EncoderError::Protocol("reply not terminated by CR".into()));
    }
    let text = std::str::from_utf8(reply)
        .map_err(|_| EncoderError::Protocol("reply is not ASCII".into()))?
        .trim();

    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() != 2 {
        return Err(EncoderError::Protocol(format!(
            "expected 2 tab-separated fields, got {} in {text:?}",
            fields.len()
        )));
    }

    let parse = |field: &str| {
        field
            .trim()
            .parse::<i64>()
            .map_err(|_| EncoderError::Protocol(format!("bad count field {field:?}")))
    };
    Ok((parse(fields[0])?, parse(fields[1])?))
}

pub struct GenericEncoders {
    config: EncoderConfig,
    transport: SerialTransport,
}

impl GenericEncoders {
    pub const NAME: &'static str = "Generic";

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

    fn query(&mut self, command: &[u8]) -> EncoderResult<(i64, i64)> {
        self.transport.write_all(command)?;
        let reply = self.transport.read_until(REPLY_TERMINATOR)?;
        parse_counts_reply(&reply)
    }
}

impl EncoderDriver for GenericEncoders {
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
            "Generic encoders connected on {port} (res {}x{})",
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
        Ok(EncoderReading::new(alt, az))
    }

    fn get_encoder_resolution(&mut self) -> EncoderResult<(i64, i64)> {
        self.query(CMD_GET_RESOLUTION)
    }

    fn set_encoder_resolution(&mut self, res_alt: i64, res_az: i64) -> EncoderResult<()> {
        let command = format_resolution_command(res_alt, res_az);
        self.transport.write_all(command.as_bytes())?;
        let ack = self.transport.read_up_to(1)?;
        match ack.first() {
            Some(&ACK) => Ok(()),
            other => Err(EncoderError::Protocol(format!(
                "resolution not acknowledged (got {other:?})"
            ))),
        }
    }
}
