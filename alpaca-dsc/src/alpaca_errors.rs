//! Reserved Alpaca error numbers and their fixed messages.

/// Error codes a telescope action can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpacaError {
    NotImplemented,
    InvalidValue,
    NotConnected,
    InvalidOperation,
    UnspecifiedError,
}

impl AlpacaError {
    pub const ALL: [AlpacaError; 5] = [
        AlpacaError::NotImplemented,
        AlpacaError::InvalidValue,
        AlpacaError::NotConnected,
        AlpacaError::InvalidOperation,
        AlpacaError::UnspecifiedError,
    ];

    pub const fn code(self) -> i32 {
        match self {
            AlpacaError::NotImplemented => 0x400,
            AlpacaError::InvalidValue => 0x401,
            AlpacaError::NotConnected => 0x407,
            AlpacaError::InvalidOperation => 0x40B,
            AlpacaError::UnspecifiedError => 0x4FF,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            AlpacaError::NotImplemented => "Method not implemented",
            AlpacaError::InvalidValue => "Invalid value",
            AlpacaError::NotConnected => "Not connected",
            AlpacaError::InvalidOperation => "Invalid operation requested",
            AlpacaError::UnspecifiedError => "Unspecified error",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }
}

/// Message for an error number; empty for success and unknown codes.
pub fn error_string(code: i32) -> &'static str {
    AlpacaError::from_code(code).map_or("", AlpacaError::message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AlpacaError::NotImplemented.code(), 1024);
        assert_eq!(AlpacaError::InvalidValue.code(), 1025);
        assert_eq!(AlpacaError::NotConnected.code(), 1031);
        assert_eq!(AlpacaError::InvalidOperation.code(), 1035);
        assert_eq!(AlpacaError::UnspecifiedError.code(), 1279);
    }

    #[test]
    fn test_lookup_by_code() {
        for err in AlpacaError::ALL {
            assert_eq!(AlpacaError::from_code(err.code()), Some(err));
            assert_eq!(error_string(err.code()), err.message());
        }
        assert_eq!(error_string(0), "");
        assert_eq!(AlpacaError::from_code(0x500), None);
    }
}
