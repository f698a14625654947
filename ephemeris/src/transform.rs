//! Equatorial <-> horizontal frame transforms.

use time::OffsetDateTime;

use crate::coordinates::{wrap_degrees, Equatorial, Horizontal, ObservingLocation};
use crate::time_utils::local_sidereal_deg;
use crate::{EphemerisError, Result};

/// Converts between equatorial and horizontal frames for an observer.
///
/// Implementations must be usable from any thread; the device server calls
/// them from the blocking pool while holding the device lock.
pub trait SkyTransform: Send + Sync {
    /// Convert an equatorial position to alt/az as seen from `site` at `time`.
    fn equatorial_to_horizontal(
        &self,
        position: Equatorial,
        time: OffsetDateTime,
        site: &ObservingLocation,
    ) -> Result<Horizontal>;

    /// Convert an alt/az pointing seen from `site` at `time` to equatorial.
    fn horizontal_to_equatorial(
        &self,
        position: Horizontal,
        time: OffsetDateTime,
        site: &ObservingLocation,
    ) -> Result<Equatorial>;
}

/// Spherical-trigonometry transform driven by mean sidereal time.
///
/// Ignores precession, nutation, aberration and refraction. The resulting
/// error (tens of arcminutes at most for the current epoch) is below what
/// hobby-grade setting circles resolve, and the transform is exactly
/// invertible, so a sync followed by a read at the same instant returns the
/// synced coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiderealTransform;

impl SiderealTransform {
    pub fn new() -> Self {
        Self
    }
}

fn check_finite(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(EphemerisError::CalculationError(format!(
            "non-finite input: {values:?}"
        )))
    }
}

impl SkyTransform for SiderealTransform {
    fn equatorial_to_horizontal(
        &self,
        position: Equatorial,
        time: OffsetDateTime,
        site: &ObservingLocation,
    ) -> Result<Horizontal> {
        check_finite(&[position.ra_deg, position.dec_deg])?;

        let lst = local_sidereal_deg(time, site.longitude_deg);
        let ha = (lst - position.ra_deg).to_radians();
        let dec = position.dec_deg.to_radians();
        let lat = site.latitude_deg.to_radians();

        let sin_alt = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos()).clamp(-1.0, 1.0);
        let alt = sin_alt.asin();

        let az = (-dec.cos() * ha.sin())
            .atan2(dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos());

        Ok(Horizontal::new(
            alt.to_degrees(),
            wrap_degrees(az.to_degrees()),
        ))
    }

    fn horizontal_to_equatorial(
        &self,
        position: Horizontal,
        time: OffsetDateTime,
        site: &ObservingLocation,
    ) -> Result<Equatorial> {
        check_finite(&[position.alt_deg, position.az_deg])?;

        let alt = position.alt_deg.to_radians();
        let az = position.az_deg.to_radians();
        let lat = site.latitude_deg.to_radians();

        let sin_dec = (lat.sin() * alt.sin() + lat.cos() * alt.cos() * az.cos()).clamp(-1.0, 1.0);
        let dec = sin_dec.asin();

        let ha = (-az.sin() * alt.cos())
            .atan2(alt.sin() * lat.cos() - alt.cos() * lat.sin() * az.cos());

        let lst = local_sidereal_deg(time, site.longitude_deg);
        Ok(Equatorial::new(lst - ha.to_degrees(), dec.to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::local_sidereal_deg;
    use approx::assert_abs_diff_eq;
    use time::macros::datetime;

    fn site() -> ObservingLocation {
        ObservingLocation::new(35.0, -106.5, 1600.0).unwrap()
    }

    #[test]
    fn test_meridian_transit_at_zenith() {
        let t = datetime!(2024-03-20 04:00 UTC);
        let site = site();
        let lst = local_sidereal_deg(t, site.longitude_deg);
        let star = Equatorial::new(lst, site.latitude_deg);

        let hz = SiderealTransform
            .equatorial_to_horizontal(star, t, &site)
            .unwrap();
        assert_abs_diff_eq!(hz.alt_deg, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pole_altitude_equals_latitude() {
        let t = datetime!(2024-03-20 04:00 UTC);
        let site = site();
        let pole = Equatorial::new(0.0, 90.0);

        let hz = SiderealTransform
            .equatorial_to_horizontal(pole, t, &site)
            .unwrap();
        assert_abs_diff_eq!(hz.alt_deg, site.latitude_deg, epsilon = 1e-9);
        let az = if hz.az_deg > 180.0 { hz.az_deg - 360.0 } else { hz.az_deg };
        assert_abs_diff_eq!(az, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let t = datetime!(2023-11-02 06:30:15 UTC);
        let site = site();
        for (ra_h, dec) in [(5.5, 22.0), (18.6, 38.8), (0.2, -10.0), (12.0, 60.0)] {
            let star = Equatorial::from_hours(ra_h, dec);
            let hz = SiderealTransform
                .equatorial_to_horizontal(star, t, &site)
                .unwrap();
            let back = SiderealTransform
                .horizontal_to_equatorial(hz, t, &site)
                .unwrap();
            assert_abs_diff_eq!(back.ra_hours(), ra_h, epsilon = 1e-6);
            assert_abs_diff_eq!(back.dec_deg, dec, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejects_nan() {
        let t = datetime!(2023-11-02 06:30:15 UTC);
        let result = SiderealTransform.equatorial_to_horizontal(
            Equatorial::new(f64::NAN, 0.0),
            t,
            &site(),
        );
        assert!(matches!(result, Err(EphemerisError::CalculationError(_))));
    }
}
