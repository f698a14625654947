//! Dispatch tables for the telescope actions.
//!
//! Every action name the device understands resolves to exactly one entry
//! here: a readable [`Property`] or a writable [`Command`]. Names are
//! matched lowercased.

use serde_json::{json, Value};

pub const DEVICE_NAME: &str = "AltAzSettingCircles";
pub const DEVICE_DESCRIPTION: &str = "Alt/Az Setting Circles";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const INTERFACE_VERSION: i32 = 3;

/// AlignmentModes.algAltAz
const ALIGNMENT_ALTAZ: i32 = 0;
/// EquatorialCoordinateType.equJ2000
const EQUATORIAL_J2000: i32 = 2;
/// DriveRates.driveSidereal
const DRIVE_SIDEREAL: i32 = 0;

pub fn driver_info() -> String {
    format!("{DEVICE_DESCRIPTION} V. {DRIVER_VERSION}")
}

/// A GET-able action.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Fixed value, independent of device state.
    Constant(Value),
    Connected,
    SiteElevation,
    SiteLatitude,
    SiteLongitude,
    Altitude,
    Azimuth,
    RightAscension,
    Declination,
    SiderealTime,
    UtcDate,
}

impl Property {
    pub fn lookup(action: &str) -> Option<Self> {
        let property = match action {
            "connected" => Property::Connected,
            "siteelevation" => Property::SiteElevation,
            "sitelatitude" => Property::SiteLatitude,
            "sitelongitude" => Property::SiteLongitude,
            "altitude" => Property::Altitude,
            "azimuth" => Property::Azimuth,
            "rightascension" => Property::RightAscension,
            "declination" => Property::Declination,
            "siderealtime" => Property::SiderealTime,
            "utcdate" => Property::UtcDate,
            other => Property::Constant(constant(other)?),
        };
        Some(property)
    }

    /// True for positions derived from the encoders.
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            Property::Altitude
                | Property::Azimuth
                | Property::RightAscension
                | Property::Declination
        )
    }
}

/// Read-only capability flags and identity strings.
fn constant(action: &str) -> Option<Value> {
    let value = match action {
        "description" => json!(DEVICE_DESCRIPTION),
        "driverinfo" => json!(driver_info()),
        "driverversion" => json!(DRIVER_VERSION),
        "interfaceversion" => json!(INTERFACE_VERSION),
        "name" => json!(DEVICE_NAME),
        "supportedactions" => json!([]),

        "alignmentmode" => json!(ALIGNMENT_ALTAZ),
        "equatorialsystem" => json!(EQUATORIAL_J2000),
        "aperturearea" | "aperturediameter" | "focallength" => json!(0.0),
        "declinationrate" | "rightascensionrate" => json!(0.0),
        "guideratedeclination" | "guideraterightascension" => json!(0.0),
        "targetdeclination" | "targetrightascension" => json!(0.0),
        "slewsettletime" => json!(0),
        "sideofpier" => json!(0),
        "trackingrate" => json!(DRIVE_SIDEREAL),
        "trackingrates" => json!([DRIVE_SIDEREAL]),

        "cansync" | "cansyncaltaz" => json!(true),
        "athome" | "atpark" | "canfindhome" | "canpark" | "canpulseguide"
        | "cansetdeclinationrate" | "cansetguiderates" | "cansetpark" | "cansetpierside"
        | "cansetrightascensionrate" | "cansettracking" | "canslew" | "canslewaltaz"
        | "canslewaltazasync" | "canslewasync" | "canunpark" | "doesrefraction"
        | "ispulseguiding" | "slewing" | "tracking" => json!(false),

        _ => return None,
    };
    Some(value)
}

/// A PUT-able action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connected,
    SyncToCoordinates,
    SyncToAltAz,
    SiteElevation,
    SiteLatitude,
    SiteLongitude,
}

impl Command {
    pub fn lookup(action: &str) -> Option<Self> {
        match action {
            "connected" => Some(Command::Connected),
            "synctocoordinates" => Some(Command::SyncToCoordinates),
            "synctoaltaz" => Some(Command::SyncToAltAz),
            "siteelevation" => Some(Command::SiteElevation),
            "sitelatitude" => Some(Command::SiteLatitude),
            "sitelongitude" => Some(Command::SiteLongitude),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert_eq!(Property::lookup("cansync"), Some(Property::Constant(json!(true))));
        assert_eq!(Property::lookup("canslew"), Some(Property::Constant(json!(false))));
        assert_eq!(Property::lookup("alignmentmode"), Some(Property::Constant(json!(0))));
        assert_eq!(
            Property::lookup("interfaceversion"),
            Some(Property::Constant(json!(3)))
        );
    }

    #[test]
    fn test_computed_keys() {
        for name in ["altitude", "azimuth", "rightascension", "declination"] {
            assert!(Property::lookup(name).unwrap().is_computed(), "{name}");
        }
        assert!(!Property::lookup("sitelatitude").unwrap().is_computed());
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(Property::lookup("slewtocoordinates"), None);
        assert_eq!(Property::lookup("synctocoordinates"), None);
        assert_eq!(Command::lookup("canslew"), None);
        assert_eq!(Command::lookup("tracking"), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            Command::lookup("synctocoordinates"),
            Some(Command::SyncToCoordinates)
        );
        assert_eq!(Command::lookup("connected"), Some(Command::Connected));
    }

    #[test]
    fn test_advertised_syncs_have_commands() {
        assert_eq!(Property::lookup("cansyncaltaz"), Some(Property::Constant(json!(true))));
        assert_eq!(Command::lookup("synctoaltaz"), Some(Command::SyncToAltAz));
        assert_eq!(Command::lookup("synctocoordinates"), Some(Command::SyncToCoordinates));
    }
}
