use thiserror::Error;

/// Errors raised by encoder drivers and their transport.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Encoders not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown encoder driver: {0}")]
    UnknownDriver(String),
}

impl EncoderError {
    /// True when the failure was a read timeout; the request may simply be retried.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EncoderError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }

    /// True for configuration problems (bad resolution, unknown driver name).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EncoderError::Config(_) | EncoderError::UnknownDriver(_)
        )
    }
}

/// Result type for encoder operations
pub type EncoderResult<T> = Result<T, EncoderError>;
