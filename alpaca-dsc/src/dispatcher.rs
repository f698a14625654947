//! Maps an Alpaca telescope action onto the device.

use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::alpaca_errors::{error_string, AlpacaError};
use crate::device::{DeviceError, SiteField, TelescopeDevice};
use crate::properties::{Command, Property};
use crate::validation::{self, Params, ValidationError};

/// Value reported for a position that cannot be computed yet.
pub const UNSYNCHRONIZED_VALUE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
}

/// Outcome of one action, before transaction ids are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub value: Option<Value>,
    pub error_number: i32,
    pub error_string: String,
}

impl ActionResponse {
    pub fn ok(value: Value) -> Self {
        Self {
            value: Some(value),
            error_number: 0,
            error_string: String::new(),
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            value: None,
            error_number: 0,
            error_string: String::new(),
        }
    }

    pub fn error(err: AlpacaError) -> Self {
        Self {
            value: None,
            error_number: err.code(),
            error_string: error_string(err.code()).to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_number == 0
    }
}

impl From<ValidationError> for ActionResponse {
    fn from(err: ValidationError) -> Self {
        warn!("Rejected request: {err}");
        ActionResponse::error(AlpacaError::InvalidValue)
    }
}

impl From<DeviceError> for ActionResponse {
    fn from(err: DeviceError) -> Self {
        warn!("Action failed: {err}");
        ActionResponse::error(err.alpaca_error())
    }
}

/// Run one action. Blocks on encoder I/O.
pub fn dispatch(device: &TelescopeDevice, verb: Verb, action: &str, params: &Params) -> ActionResponse {
    let action = action.to_ascii_lowercase();
    debug!("{verb:?} {action}");

    match verb {
        Verb::Get => match Property::lookup(&action) {
            Some(property) => read_property(device, property),
            None => ActionResponse::error(AlpacaError::NotImplemented),
        },
        Verb::Put => match Command::lookup(&action) {
            Some(command) => run_command(device, command, params),
            None => ActionResponse::error(AlpacaError::NotImplemented),
        },
    }
}

fn read_property(device: &TelescopeDevice, property: Property) -> ActionResponse {
    let value = match property {
        Property::Constant(value) => value,
        Property::Connected => json!(device.is_connected()),
        Property::SiteLatitude => json!(device.site().0),
        Property::SiteLongitude => json!(device.site().1),
        Property::SiteElevation => json!(device.site().2),
        Property::Altitude => json!(device
            .current_altaz()
            .map_or(UNSYNCHRONIZED_VALUE, |h| h.alt_deg)),
        Property::Azimuth => json!(device
            .current_altaz()
            .map_or(UNSYNCHRONIZED_VALUE, |h| h.az_deg)),
        Property::RightAscension => json!(device
            .current_radec()
            .map_or(UNSYNCHRONIZED_VALUE, |eq| eq.ra_hours())),
        Property::Declination => json!(device
            .current_radec()
            .map_or(UNSYNCHRONIZED_VALUE, |eq| eq.dec_deg)),
        Property::SiderealTime => json!(device.sidereal_time_hours().unwrap_or(0.0)),
        Property::UtcDate => match device.now().format(&Rfc3339) {
            Ok(date) => json!(date),
            Err(e) => {
                warn!("Failed to format UTC date: {e}");
                return ActionResponse::error(AlpacaError::UnspecifiedError);
            }
        },
    };
    ActionResponse::ok(value)
}

fn run_command(device: &TelescopeDevice, command: Command, params: &Params) -> ActionResponse {
    let result = match command {
        Command::Connected => match validation::parse_bool(params, "Connected") {
            Ok(true) => device.connect(),
            Ok(false) => {
                device.disconnect();
                Ok(())
            }
            Err(e) => return e.into(),
        },
        Command::SyncToCoordinates => {
            let ra = validation::RIGHT_ASCENSION.parse(params);
            let dec = validation::DECLINATION.parse(params);
            match (ra, dec) {
                (Ok(ra), Ok(dec)) => device.sync_to_coordinates(ra, dec),
                (Err(e), _) | (_, Err(e)) => return e.into(),
            }
        }
        Command::SyncToAltAz => {
            let alt = validation::ALTITUDE.parse(params);
            let az = validation::AZIMUTH.parse(params);
            match (alt, az) {
                (Ok(alt), Ok(az)) => device.sync_to_altaz(alt, az),
                (Err(e), _) | (_, Err(e)) => return e.into(),
            }
        }
        Command::SiteLatitude => match validation::SITE_LATITUDE.parse(params) {
            Ok(v) => device.set_site(SiteField::Latitude, v),
            Err(e) => return e.into(),
        },
        Command::SiteLongitude => match validation::SITE_LONGITUDE.parse(params) {
            Ok(v) => device.set_site(SiteField::Longitude, v),
            Err(e) => return e.into(),
        },
        Command::SiteElevation => match validation::SITE_ELEVATION.parse(params) {
            Ok(v) => device.set_site(SiteField::Elevation, v),
            Err(e) => return e.into(),
        },
    };

    match result {
        Ok(()) => ActionResponse::ok_empty(),
        Err(e) => e.into(),
    }
}
