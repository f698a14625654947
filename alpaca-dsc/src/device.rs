//! The single telescope device shared by every request.
//!
//! All mutable state (active driver, sync anchor, profile) sits behind one
//! mutex. Methods here block on serial I/O and must be called from the
//! blocking pool, never directly on an async worker.

use std::sync::{Arc, Mutex, MutexGuard};

use encoders::{DriverRegistry, EncoderDriver, EncoderError};
use ephemeris::{EphemerisError, Equatorial, Horizontal, ObservingLocation, SkyTransform};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::alpaca_errors::AlpacaError;
use crate::clock::Clock;
use crate::profile::{EncodersProfile, Profile, ProfileError, ProfileStore, SiteProfile};
use crate::sync_engine::{SyncAnchor, SyncEngine, SyncError};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not connected")]
    NotConnected,

    #[error("No profile loaded")]
    NoProfile,

    #[error("Disconnect before changing profiles")]
    Connected,

    #[error("No profile store attached")]
    NoStore,

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid site: {0}")]
    Site(#[from] EphemerisError),
}

impl DeviceError {
    /// Alpaca error number reported for this failure.
    pub fn alpaca_error(&self) -> AlpacaError {
        match self {
            DeviceError::NotConnected => AlpacaError::NotConnected,
            DeviceError::NoProfile | DeviceError::Connected | DeviceError::NoStore => {
                AlpacaError::InvalidOperation
            }
            DeviceError::Profile(e) if e.is_config() => AlpacaError::InvalidOperation,
            DeviceError::Profile(_) => AlpacaError::UnspecifiedError,
            DeviceError::Encoder(EncoderError::NotConnected) => AlpacaError::NotConnected,
            DeviceError::Encoder(e) if e.is_config() => AlpacaError::InvalidOperation,
            DeviceError::Encoder(_) => AlpacaError::UnspecifiedError,
            DeviceError::Sync(SyncError::Encoder(EncoderError::NotConnected)) => {
                AlpacaError::NotConnected
            }
            DeviceError::Sync(_) => AlpacaError::UnspecifiedError,
            DeviceError::Site(_) => AlpacaError::InvalidValue,
        }
    }
}

/// Snapshot served by the encoder monitor endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EncoderStatus {
    pub connected: bool,
    pub driver: Option<String>,
    pub counts: Option<[i64; 2]>,
    pub altaz_deg: Option<[f64; 2]>,
    pub radec: Option<[f64; 2]>,
    pub clip_events: u64,
}

/// Which location field a site setter changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteField {
    Latitude,
    Longitude,
    Elevation,
}

struct DeviceState {
    profile: Option<Profile>,
    driver: Option<Box<dyn EncoderDriver>>,
    location: Option<ObservingLocation>,
    engine: SyncEngine,
}

impl DeviceState {
    fn connected(&self) -> bool {
        self.driver.is_some()
    }
}

pub struct TelescopeDevice {
    state: Mutex<DeviceState>,
    registry: DriverRegistry,
    clock: Arc<dyn Clock>,
    store: Option<ProfileStore>,
}

impl TelescopeDevice {
    /// Create a disconnected device with no profile.
    pub fn new(
        registry: DriverRegistry,
        transform: Arc<dyn SkyTransform>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                profile: None,
                driver: None,
                location: None,
                engine: SyncEngine::new(transform),
            }),
            registry,
            clock,
            store: None,
        }
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.lock().profile = Some(profile);
        self
    }

    /// Persist site changes to this store.
    pub fn with_store(mut self, store: ProfileStore) -> Self {
        self.store = Some(store);
        self
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    pub fn driver_name(&self) -> Option<&'static str> {
        self.lock().driver.as_ref().map(|d| d.name())
    }

    pub fn anchor(&self) -> Option<SyncAnchor> {
        self.lock().engine.anchor()
    }

    pub fn clip_events(&self) -> u64 {
        self.lock().engine.clip_events()
    }

    /// Build the profile's driver and open it.
    ///
    /// Nothing changes unless every step succeeds. Connecting an already
    /// connected device does nothing.
    pub fn connect(&self) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if state.connected() {
            info!("Connect requested while already connected");
            return Ok(());
        }

        let profile = state.profile.as_ref().ok_or(DeviceError::NoProfile)?;
        let config = profile.encoder_config()?;
        let location = profile.observing_location()?;
        let driver_name = profile.encoders.driver.clone();

        let mut driver = self.registry.create(&driver_name, config)?;
        let (port, speed) = (driver.config().port().to_string(), driver.config().speed());
        info!("Connecting {driver_name} encoders on {port:?} at {speed} bps");

        if let Err(e) = driver.connect(&port, speed) {
            error!("Failed to connect {driver_name} encoders: {e}");
            driver.disconnect();
            return Err(e.into());
        }

        state.location = Some(location);
        state.driver = Some(driver);
        info!("Telescope connected using profile {:?}", profile_name(&state));
        Ok(())
    }

    /// Release the driver and forget the sync anchor. Always succeeds.
    pub fn disconnect(&self) {
        let mut state = self.lock();
        if let Some(mut driver) = state.driver.take() {
            driver.disconnect();
            info!("Telescope disconnected");
        }
        state.engine.clear();
        state.location = None;
    }

    /// Sync the current encoder counts to RA (hours) / Dec (degrees).
    pub fn sync_to_coordinates(&self, ra_hours: f64, dec_deg: f64) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        let now = self.now();
        let state = &mut *guard;

        let driver = state.driver.as_deref_mut().ok_or(DeviceError::NotConnected)?;
        let location = state.location.ok_or(DeviceError::NotConnected)?;
        state
            .engine
            .sync_to_coordinates(driver, &location, ra_hours, dec_deg, now)?;
        Ok(())
    }

    /// Sync the current encoder counts to a known altitude / azimuth in degrees.
    pub fn sync_to_altaz(&self, alt_deg: f64, az_deg: f64) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let driver = state.driver.as_deref_mut().ok_or(DeviceError::NotConnected)?;
        state.engine.sync_to_altaz(driver, alt_deg, az_deg)?;
        Ok(())
    }

    /// Current alt/az; None when disconnected, unsynced or the read fails.
    pub fn current_altaz(&self) -> Option<Horizontal> {
        let mut guard = self.lock();
        let now = self.now();
        let state = &mut *guard;
        let driver = state.driver.as_deref_mut()?;
        state.engine.current_altaz(driver, now)
    }

    /// Current RA/Dec; None when disconnected, unsynced or the read fails.
    pub fn current_radec(&self) -> Option<Equatorial> {
        let mut guard = self.lock();
        let now = self.now();
        let state = &mut *guard;
        let driver = state.driver.as_deref_mut()?;
        let location = state.location?;
        state.engine.current_radec(driver, &location, now)
    }

    /// Local mean sidereal time in hours at the profile's longitude.
    pub fn sidereal_time_hours(&self) -> Option<f64> {
        let longitude = self.lock().profile.as_ref()?.location.longitude;
        Some(ephemeris::time_utils::local_sidereal_deg(self.now(), longitude) / 15.0)
    }

    /// Site (latitude, longitude, elevation) from the profile, zeros without one.
    pub fn site(&self) -> (f64, f64, f64) {
        self.lock()
            .profile
            .as_ref()
            .map(|p| (p.location.latitude, p.location.longitude, p.location.altitude))
            .unwrap_or((0.0, 0.0, 0.0))
    }

    /// Change one site field, updating the live location and the stored profile.
    pub fn set_site(&self, field: SiteField, value: f64) -> Result<(), DeviceError> {
        let mut state = self.lock();
        let profile = state.profile.as_ref().ok_or(DeviceError::NoProfile)?;

        let mut updated = profile.clone();
        match field {
            SiteField::Latitude => updated.location.latitude = value,
            SiteField::Longitude => updated.location.longitude = value,
            SiteField::Elevation => updated.location.altitude = value,
        }
        let site = &updated.location;
        let location = ObservingLocation::new(site.latitude, site.longitude, site.altitude)?;

        if let Some(store) = &self.store {
            store.save(&updated)?;
        }
        info!("Site {field:?} set to {value} for profile {:?}", updated.name);

        if state.connected() {
            state.location = Some(location);
        }
        state.profile = Some(updated);
        Ok(())
    }

    /// Names of the stored profiles; empty without a store.
    pub fn stored_profiles(&self) -> Result<Vec<String>, DeviceError> {
        match &self.store {
            Some(store) => Ok(store.list_profiles()?),
            None => Ok(Vec::new()),
        }
    }

    fn persist(&self, profile: &Profile) -> Result<(), DeviceError> {
        if let Some(store) = &self.store {
            store.save(profile)?;
        }
        Ok(())
    }

    /// Replace the encoder settings of the loaded profile.
    ///
    /// The driver must be registered and the resolutions valid. A connected
    /// device keeps its current driver until the next connect.
    pub fn set_encoders(&self, encoders: EncodersProfile) -> Result<Profile, DeviceError> {
        let mut state = self.lock();
        let profile = state.profile.as_ref().ok_or(DeviceError::NoProfile)?;
        if !self.registry.contains(&encoders.driver) {
            return Err(EncoderError::UnknownDriver(encoders.driver).into());
        }

        let mut updated = profile.clone();
        updated.encoders = encoders;
        updated.encoder_config()?;
        self.persist(&updated)?;
        info!(
            "Encoders for profile {:?} set to {} on {:?}",
            updated.name, updated.encoders.driver, updated.encoders.serial_port
        );

        state.profile = Some(updated.clone());
        Ok(updated)
    }

    /// Replace the observing site of the loaded profile.
    pub fn set_location(&self, site: SiteProfile) -> Result<Profile, DeviceError> {
        let mut state = self.lock();
        let profile = state.profile.as_ref().ok_or(DeviceError::NoProfile)?;

        let mut updated = profile.clone();
        updated.location = site;
        let location = updated.observing_location()?;
        self.persist(&updated)?;
        info!(
            "Site for profile {:?} set to {:?} ({}, {}, {} m)",
            updated.name,
            updated.location.obsname,
            updated.location.latitude,
            updated.location.longitude,
            updated.location.altitude
        );

        if state.connected() {
            state.location = Some(location);
        }
        state.profile = Some(updated.clone());
        Ok(updated)
    }

    /// Load a stored profile and make it current. Only while disconnected.
    pub fn select_profile(&self, name: &str) -> Result<Profile, DeviceError> {
        let store = self.store.as_ref().ok_or(DeviceError::NoStore)?;
        let mut state = self.lock();
        if state.connected() {
            return Err(DeviceError::Connected);
        }

        let profile = store.load(name)?;
        store.set_current_profile(name)?;
        info!("Profile {name:?} selected");
        state.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Store a new profile with default settings and select it.
    pub fn create_profile(&self, name: &str) -> Result<Profile, DeviceError> {
        let store = self.store.as_ref().ok_or(DeviceError::NoStore)?;
        let mut state = self.lock();
        if state.connected() {
            return Err(DeviceError::Connected);
        }
        if store.exists(name) {
            return Err(ProfileError::AlreadyExists(name.to_string()).into());
        }

        let profile = Profile::new(name);
        store.save(&profile)?;
        store.set_current_profile(name)?;
        info!("Profile {name:?} created and selected");
        state.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Raw counts plus derived positions for monitoring.
    pub fn status(&self) -> EncoderStatus {
        let mut guard = self.lock();
        let now = self.now();
        let state = &mut *guard;
        let clip_events = state.engine.clip_events();

        let Some(driver) = state.driver.as_deref_mut() else {
            return EncoderStatus {
                connected: false,
                driver: None,
                counts: None,
                altaz_deg: None,
                radec: None,
                clip_events,
            };
        };

        let name = driver.name().to_string();
        let reading = match driver.get_encoder_position() {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("Encoder status read failed: {e}");
                None
            }
        };
        let altaz = reading.and_then(|r| state.engine.project(r, driver.config()));
        let radec = match (altaz, state.location) {
            (Some(altaz), Some(location)) => state.engine.to_equatorial(altaz, &location, now),
            _ => None,
        };

        EncoderStatus {
            connected: true,
            driver: Some(name),
            counts: reading.map(|r| [r.alt_raw, r.az_raw]),
            altaz_deg: altaz.map(|h| [h.alt_deg, h.az_deg]),
            radec: radec.map(|eq| [eq.ra_hours(), eq.dec_deg]),
            clip_events: state.engine.clip_events(),
        }
    }
}

fn profile_name(state: &DeviceState) -> &str {
    state.profile.as_ref().map_or("", |p| p.name.as_str())
}
