//! Time scale helpers: Julian dates and sidereal time.

use time::OffsetDateTime;

use crate::coordinates::wrap_degrees;

/// Julian date of the Unix epoch (1970-01-01T00:00:00Z).
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian date of the J2000.0 epoch.
pub const J2000_JD: f64 = 2_451_545.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date (UT) for an instant.
pub fn julian_date(time: OffsetDateTime) -> f64 {
    let seconds = time.unix_timestamp_nanos() as f64 / 1e9;
    UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY
}

/// Greenwich mean sidereal time in degrees, [0, 360).
///
/// IAU 1982 expression; good to well under an arcsecond over several
/// centuries, which is far below encoder resolution.
pub fn gmst_deg(time: OffsetDateTime) -> f64 {
    let d = julian_date(time) - J2000_JD;
    let t = d / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    wrap_degrees(gmst)
}

/// Local mean sidereal time in degrees for an east-positive longitude.
pub fn local_sidereal_deg(time: OffsetDateTime, longitude_deg: f64) -> f64 {
    wrap_degrees(gmst_deg(time) + longitude_deg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use time::macros::datetime;

    #[test]
    fn test_julian_date_j2000() {
        let jd = julian_date(datetime!(2000-01-01 12:00 UTC));
        assert_abs_diff_eq!(jd, J2000_JD, epsilon = 1e-9);
    }

    #[test]
    fn test_gmst_at_j2000() {
        let gmst = gmst_deg(datetime!(2000-01-01 12:00 UTC));
        assert_abs_diff_eq!(gmst, 280.460_618_37, epsilon = 1e-6);
    }

    #[test]
    fn test_local_sidereal_wraps() {
        let t = datetime!(2000-01-01 12:00 UTC);
        let lst = local_sidereal_deg(t, 100.0);
        assert_abs_diff_eq!(lst, 20.460_618_37, epsilon = 1e-6);
    }
}
