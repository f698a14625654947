//! Request parameters and per-field validation.
//!
//! Alpaca parameter names are case-insensitive, so keys are lowercased on
//! the way in. Each PUT field has a declared range; a value that is
//! missing, unparseable, non-finite or out of range is rejected before any
//! handler touches device state.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing parameter {0}")]
    Missing(&'static str),

    #[error("Parameter {field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("Parameter {field} is not a boolean: {value:?}")]
    NotABool { field: &'static str, value: String },

    #[error("Parameter {field} = {value} outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: Range,
    },
}

/// Request parameters with case-folded names.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    /// ClientTransactionID, or 0 when absent or not a u32.
    pub fn client_transaction_id(&self) -> u32 {
        self.get("ClientTransactionID")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// ClientID, or 0 when absent or not a u32.
    pub fn client_id(&self) -> u32 {
        self.get("ClientID")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k.as_ref(), v);
        }
        params
    }
}

/// Accepted interval for a numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Range {
    Any,
    /// lo <= v <= hi
    Closed(f64, f64),
    /// lo <= v < hi
    HalfOpen(f64, f64),
}

impl Range {
    pub fn contains(&self, v: f64) -> bool {
        match *self {
            Range::Any => true,
            Range::Closed(lo, hi) => (lo..=hi).contains(&v),
            Range::HalfOpen(lo, hi) => (lo..hi).contains(&v),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::Any => write!(f, "(-inf, inf)"),
            Range::Closed(lo, hi) => write!(f, "[{lo}, {hi}]"),
            Range::HalfOpen(lo, hi) => write!(f, "[{lo}, {hi})"),
        }
    }
}

/// A numeric PUT field and its accepted range.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub range: Range,
}

/// Hours
pub const RIGHT_ASCENSION: FieldSpec = FieldSpec {
    name: "RightAscension",
    range: Range::HalfOpen(0.0, 24.0),
};

pub const DECLINATION: FieldSpec = FieldSpec {
    name: "Declination",
    range: Range::Closed(-90.0, 90.0),
};

pub const ALTITUDE: FieldSpec = FieldSpec {
    name: "Altitude",
    range: Range::Closed(-90.0, 90.0),
};

pub const AZIMUTH: FieldSpec = FieldSpec {
    name: "Azimuth",
    range: Range::HalfOpen(0.0, 360.0),
};

pub const SITE_LATITUDE: FieldSpec = FieldSpec {
    name: "SiteLatitude",
    range: Range::Closed(-90.0, 90.0),
};

pub const SITE_LONGITUDE: FieldSpec = FieldSpec {
    name: "SiteLongitude",
    range: Range::Closed(-180.0, 180.0),
};

/// Meters
pub const SITE_ELEVATION: FieldSpec = FieldSpec {
    name: "SiteElevation",
    range: Range::Any,
};

impl FieldSpec {
    pub fn parse(&self, params: &Params) -> Result<f64, ValidationError> {
        let raw = params
            .get(self.name)
            .ok_or(ValidationError::Missing(self.name))?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::NotANumber {
                field: self.name,
                value: raw.to_string(),
            })?;
        if !value.is_finite() {
            return Err(ValidationError::NotANumber {
                field: self.name,
                value: raw.to_string(),
            });
        }
        if !self.range.contains(value) {
            return Err(ValidationError::OutOfRange {
                field: self.name,
                value,
                range: self.range,
            });
        }
        Ok(value)
    }
}

/// Parse a `true`/`false` field, any case.
pub fn parse_bool(params: &Params, name: &'static str) -> Result<bool, ValidationError> {
    let raw = params.get(name).ok_or(ValidationError::Missing(name))?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValidationError::NotABool {
            field: name,
            value: raw.to_string(),
        }),
    }
}
