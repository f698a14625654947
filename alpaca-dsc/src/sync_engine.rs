//! Turns raw encoder counts into sky coordinates.
//!
//! Setting circles are incremental: the counts only mean something relative
//! to a known sky position. Syncing records one (counts, alt/az) pair as the
//! anchor; every later position is the anchor plus the count delta scaled by
//! the axis resolution.

use std::sync::Arc;

use encoders::{EncoderConfig, EncoderDriver, EncoderError, EncoderReading};
use ephemeris::{
    wrap_degrees, EphemerisError, Equatorial, Horizontal, ObservingLocation, SkyTransform,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Encoder read failed: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Coordinate transform failed: {0}")]
    Transform(#[from] EphemerisError),
}

/// Encoder counts paired with the sky position they were synced to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncAnchor {
    pub enc_alt0: i64,
    pub enc_az0: i64,
    pub sky_alt0_deg: f64,
    pub sky_az0_deg: f64,
}

/// Alt/az derived from a reading, before and after altitude clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub altaz: Horizontal,
    pub unclipped_alt_deg: f64,
}

impl Projection {
    pub fn clipped(&self) -> bool {
        self.altaz.alt_deg != self.unclipped_alt_deg
    }
}

fn axis_delta_deg(current: i64, anchor: i64, resolution: u32, reversed: bool) -> f64 {
    let delta = 360.0 * (current - anchor) as f64 / f64::from(resolution);
    if reversed {
        -delta
    } else {
        delta
    }
}

/// Project a reading through an anchor.
///
/// Altitude is clamped to [-90, 90]; azimuth is wrapped into [0, 360).
pub fn project_from_anchor(
    anchor: &SyncAnchor,
    reading: EncoderReading,
    config: &EncoderConfig,
) -> Projection {
    let d_alt = axis_delta_deg(
        reading.alt_raw,
        anchor.enc_alt0,
        config.res_alt(),
        config.reverse_alt(),
    );
    let d_az = axis_delta_deg(
        reading.az_raw,
        anchor.enc_az0,
        config.res_az(),
        config.reverse_az(),
    );

    let unclipped_alt_deg = anchor.sky_alt0_deg + d_alt;
    let alt_deg = unclipped_alt_deg.clamp(-90.0, 90.0);
    let az_deg = wrap_degrees(anchor.sky_az0_deg + d_az);

    Projection {
        altaz: Horizontal::new(alt_deg, az_deg),
        unclipped_alt_deg,
    }
}

/// Sync anchor plus the transform used to move between frames.
pub struct SyncEngine {
    transform: Arc<dyn SkyTransform>,
    anchor: Option<SyncAnchor>,
    clip_events: u64,
}

impl SyncEngine {
    pub fn new(transform: Arc<dyn SkyTransform>) -> Self {
        Self {
            transform,
            anchor: None,
            clip_events: 0,
        }
    }

    pub fn anchor(&self) -> Option<SyncAnchor> {
        self.anchor
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn clear(&mut self) {
        if self.anchor.take().is_some() {
            debug!("Sync anchor cleared");
        }
    }

    /// Number of positions whose altitude had to be clamped.
    pub fn clip_events(&self) -> u64 {
        self.clip_events
    }

    /// Anchor the current encoder counts to the given RA/Dec.
    ///
    /// Single attempt: on a failed read the previous anchor is kept.
    pub fn sync_to_coordinates(
        &mut self,
        driver: &mut dyn EncoderDriver,
        location: &ObservingLocation,
        ra_hours: f64,
        dec_deg: f64,
        now: OffsetDateTime,
    ) -> Result<SyncAnchor, SyncError> {
        let target = Equatorial::from_hours(ra_hours, dec_deg);
        let altaz = self
            .transform
            .equatorial_to_horizontal(target, now, location)?;
        let reading = driver.get_encoder_position()?;

        let anchor = SyncAnchor {
            enc_alt0: reading.alt_raw,
            enc_az0: reading.az_raw,
            sky_alt0_deg: altaz.alt_deg,
            sky_az0_deg: altaz.az_deg,
        };
        info!(
            "Synced RA {ra_hours:.4}h Dec {dec_deg:.4} -> alt {:.4} az {:.4} at counts ({}, {})",
            anchor.sky_alt0_deg, anchor.sky_az0_deg, anchor.enc_alt0, anchor.enc_az0
        );
        self.anchor = Some(anchor);
        Ok(anchor)
    }

    /// Anchor the current encoder counts to a known alt/az.
    ///
    /// Same single-attempt rule as [`Self::sync_to_coordinates`]. No frame
    /// transform is involved, so the site and time do not matter.
    pub fn sync_to_altaz(
        &mut self,
        driver: &mut dyn EncoderDriver,
        alt_deg: f64,
        az_deg: f64,
    ) -> Result<SyncAnchor, SyncError> {
        let reading = driver.get_encoder_position()?;

        let anchor = SyncAnchor {
            enc_alt0: reading.alt_raw,
            enc_az0: reading.az_raw,
            sky_alt0_deg: alt_deg,
            sky_az0_deg: wrap_degrees(az_deg),
        };
        info!(
            "Synced alt {alt_deg:.4} az {:.4} at counts ({}, {})",
            anchor.sky_az0_deg, anchor.enc_alt0, anchor.enc_az0
        );
        self.anchor = Some(anchor);
        Ok(anchor)
    }

    /// Project an already-taken reading; None when not synced.
    pub fn project(&mut self, reading: EncoderReading, config: &EncoderConfig) -> Option<Horizontal> {
        let anchor = self.anchor?;
        let projection = project_from_anchor(&anchor, reading, config);
        if projection.clipped() {
            self.clip_events += 1;
            warn!(
                "Altitude {:.3} outside [-90, 90], clipped to {:.1}",
                projection.unclipped_alt_deg, projection.altaz.alt_deg
            );
        }
        Some(projection.altaz)
    }

    /// Current alt/az, or None when not synced or the read fails.
    ///
    /// The position is relative to the anchor only, so `now` does not enter
    /// the result.
    pub fn current_altaz(
        &mut self,
        driver: &mut dyn EncoderDriver,
        _now: OffsetDateTime,
    ) -> Option<Horizontal> {
        self.anchor?;
        let reading = match driver.get_encoder_position() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Encoder read failed: {e}");
                return None;
            }
        };
        self.project(reading, driver.config())
    }

    /// Convert alt/az to RA/Dec at `now`.
    pub fn to_equatorial(
        &self,
        altaz: Horizontal,
        location: &ObservingLocation,
        now: OffsetDateTime,
    ) -> Option<Equatorial> {
        match self.transform.horizontal_to_equatorial(altaz, now, location) {
            Ok(eq) => Some(eq),
            Err(e) => {
                warn!("Horizontal to equatorial conversion failed: {e}");
                None
            }
        }
    }

    /// Current RA/Dec using the current time, or None when not synced or the read fails.
    pub fn current_radec(
        &mut self,
        driver: &mut dyn EncoderDriver,
        location: &ObservingLocation,
        now: OffsetDateTime,
    ) -> Option<Equatorial> {
        let altaz = self.current_altaz(driver, now)?;
        self.to_equatorial(altaz, location, now)
    }
}
