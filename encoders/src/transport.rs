//! Blocking serial transport shared by the hardware drivers.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{EncoderError, EncoderResult};

/// Read timeout for every serial transaction.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Arduino-based boxes reset when the port opens and need this long to boot.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Longest ASCII reply accepted before giving up on finding the terminator.
const MAX_LINE_LEN: usize = 64;

/// Anything bytes can be written to and read from: a serial port or a test double.
pub trait ByteLink: Read + Write + Send {}

impl<T: Read + Write + Send> ByteLink for T {}

/// Owns the open link for a driver.
///
/// Drivers hold one of these instead of inheriting serial behaviour.
pub struct SerialTransport {
    link: Option<Box<dyn ByteLink>>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self { link: None }
    }

    /// Open a serial device at the given baud rate and wait for it to settle.
    pub fn open(&mut self, port: &str, speed: u32) -> EncoderResult<()> {
        if self.link.is_some() {
            warn!("Serial transport already open, reopening on {port}");
            self.close();
        }

        info!("Opening serial port {port} at {speed} bps");
        let serial = serialport::new(port, speed)
            .timeout(SERIAL_TIMEOUT)
            .open()?;

        debug!("Waiting {SETTLE_DELAY:?} for encoder box to settle");
        std::thread::sleep(SETTLE_DELAY);

        self.link = Some(Box::new(serial));
        Ok(())
    }

    /// Use an already-open link (no settle delay).
    pub fn attach(&mut self, link: Box<dyn ByteLink>) {
        self.link = Some(link);
    }

    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!("Serial transport closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn link(&mut self) -> EncoderResult<&mut Box<dyn ByteLink>> {
        self.link.as_mut().ok_or(EncoderError::NotConnected)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> EncoderResult<()> {
        debug!("serial tx {bytes:?}");
        let link = self.link()?;
        link.write_all(bytes)?;
        link.flush()?;
        Ok(())
    }

    /// Read up to `n` bytes, stopping early at end of stream or on a timeout
    /// after at least one byte arrived.
    ///
    /// A timeout with nothing received is returned as an IO error; a short
    /// read is returned as-is so the protocol layer can reject it.
    pub fn read_up_to(&mut self, n: usize) -> EncoderResult<Vec<u8>> {
        let link = self.link()?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match link.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut && filled > 0 => break,
                Err(e) => return Err(e.into()),
            }
        }

        buf.truncate(filled);
        debug!("serial rx {buf:?}");
        Ok(buf)
    }

    /// Read bytes up to and including `terminator`.
    ///
    /// The terminator may be missing from the result if the stream ended or
    /// timed out first.
    pub fn read_until(&mut self, terminator: u8) -> EncoderResult<Vec<u8>> {
        let link = self.link()?;
        let mut out = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match link.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    out.push(byte[0]);
                    if byte[0] == terminator {
                        break;
                    }
                    if out.len() >= MAX_LINE_LEN {
                        return Err(EncoderError::Protocol(format!(
                            "no terminator within {MAX_LINE_LEN} bytes"
                        )));
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut && !out.is_empty() => break,
                Err(e) => return Err(e.into()),
            }
        }

        debug!("serial rx {out:?}");
        Ok(out)
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}
