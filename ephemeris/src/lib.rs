//! Ephemeris calculation library for telescope pointing
//!
//! This crate provides the coordinate types and frame transforms needed to
//! turn a telescope's horizontal (alt/az) pointing into equatorial (RA/Dec)
//! coordinates and back, for a given observing site and instant.

use thiserror::Error;

pub mod coordinates;
pub mod time_utils;
pub mod transform;

pub use coordinates::{wrap_degrees, Equatorial, Horizontal, ObservingLocation};
pub use transform::{SiderealTransform, SkyTransform};

/// Error types for ephemeris calculations
#[derive(Debug, Error)]
pub enum EphemerisError {
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

pub type Result<T> = std::result::Result<T, EphemerisError>;
