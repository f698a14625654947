//! Sky and site coordinate types.

use serde::{Deserialize, Serialize};

use crate::{EphemerisError, Result};

/// Wrap an angle into [0, 360).
///
/// `rem_euclid` rounds tiny negative inputs up to exactly 360.0, which is
/// folded back to 0.
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Equatorial (ICRS / J2000) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equatorial {
    /// Right ascension in degrees, [0, 360)
    pub ra_deg: f64,
    /// Declination in degrees, [-90, 90]
    pub dec_deg: f64,
}

impl Equatorial {
    /// Create from right ascension in degrees, normalizing RA into [0, 360).
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra_deg: wrap_degrees(ra_deg),
            dec_deg,
        }
    }

    /// Create from right ascension in decimal hours.
    pub fn from_hours(ra_hours: f64, dec_deg: f64) -> Self {
        Self::new(ra_hours * 15.0, dec_deg)
    }

    /// Right ascension in decimal hours, [0, 24).
    pub fn ra_hours(&self) -> f64 {
        self.ra_deg / 15.0
    }
}

/// Horizontal (topocentric alt/az) coordinates.
///
/// Azimuth is measured from north through east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizontal {
    /// Altitude above the horizon in degrees
    pub alt_deg: f64,
    /// Azimuth in degrees
    pub az_deg: f64,
}

impl Horizontal {
    pub fn new(alt_deg: f64, az_deg: f64) -> Self {
        Self { alt_deg, az_deg }
    }
}

/// Geographic position of the observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservingLocation {
    /// Geodetic latitude in degrees, north positive
    pub latitude_deg: f64,
    /// Longitude in degrees, east positive
    pub longitude_deg: f64,
    /// Height above sea level in meters
    pub elevation_m: f64,
}

impl ObservingLocation {
    /// Create a validated observing location.
    ///
    /// Latitude must lie in [-90, 90], longitude in [-180, 180] and all
    /// values must be finite.
    pub fn new(latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Result<Self> {
        if !latitude_deg.is_finite() || !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(EphemerisError::InvalidLocation(format!(
                "latitude {latitude_deg} outside [-90, 90]"
            )));
        }
        if !longitude_deg.is_finite() || !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(EphemerisError::InvalidLocation(format!(
                "longitude {longitude_deg} outside [-180, 180]"
            )));
        }
        if !elevation_m.is_finite() {
            return Err(EphemerisError::InvalidLocation(format!(
                "elevation {elevation_m} is not finite"
            )));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
            elevation_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ra_hours_round_trip() {
        let eq = Equatorial::from_hours(5.5, 22.0);
        assert_relative_eq!(eq.ra_deg, 82.5);
        assert_relative_eq!(eq.ra_hours(), 5.5);
    }

    #[test]
    fn test_ra_normalized() {
        let eq = Equatorial::new(-15.0, 0.0);
        assert_relative_eq!(eq.ra_deg, 345.0);
    }

    #[test]
    fn test_tiny_negative_ra_stays_below_24h() {
        let eq = Equatorial::new(-1e-14, 0.0);
        assert!(eq.ra_deg < 360.0);
        assert!(eq.ra_hours() < 24.0);
        assert_eq!(wrap_degrees(-1e-14), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_relative_eq!(wrap_degrees(-1.0), 359.0);
    }

    #[test]
    fn test_location_validation() {
        assert!(ObservingLocation::new(35.0, -106.0, 1500.0).is_ok());
        assert!(ObservingLocation::new(91.0, 0.0, 0.0).is_err());
        assert!(ObservingLocation::new(0.0, 180.5, 0.0).is_err());
        assert!(ObservingLocation::new(0.0, 0.0, f64::NAN).is_err());
    }
}
