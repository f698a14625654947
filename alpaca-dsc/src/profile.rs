//! Named observing profiles and their on-disk store.
//!
//! A profile bundles the observing site and the encoder box settings. Each
//! profile is one pretty-printed JSON file under
//! `~/.config/alpacadsc/profiles/`; the name of the profile to use on startup
//! is kept in `current_profile.json` next to that directory.

use std::path::{Path, PathBuf};

use encoders::{EncoderConfig, EncoderError, SimulatorEncoders, DEFAULT_SERIAL_SPEED};
use ephemeris::ObservingLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resolution assumed for a fresh profile, steps per revolution.
pub const DEFAULT_RESOLUTION: u32 = 4000;

const PROFILES_DIR: &str = "profiles";
const CURRENT_PROFILE_FILE: &str = "current_profile.json";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid profile name: {0:?}")]
    InvalidName(String),

    #[error("Invalid profile: {0}")]
    Invalid(String),
}

impl ProfileError {
    /// True when the profile content or name is the problem rather than the filesystem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ProfileError::NotFound(_)
                | ProfileError::AlreadyExists(_)
                | ProfileError::InvalidName(_)
                | ProfileError::Invalid(_)
        )
    }
}

/// Observing site as stored in a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub obsname: String,
    /// Degrees, north positive
    pub latitude: f64,
    /// Degrees, east positive
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            obsname: "Observatory".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
        }
    }
}

/// Encoder box settings as stored in a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodersProfile {
    /// Registry name of the driver
    pub driver: String,
    pub serial_port: String,
    pub serial_speed: u32,
    pub alt_resolution: u32,
    pub az_resolution: u32,
    pub alt_reverse: bool,
    pub az_reverse: bool,
}

impl Default for EncodersProfile {
    fn default() -> Self {
        Self {
            driver: SimulatorEncoders::NAME.to_string(),
            serial_port: String::new(),
            serial_speed: DEFAULT_SERIAL_SPEED,
            alt_resolution: DEFAULT_RESOLUTION,
            az_resolution: DEFAULT_RESOLUTION,
            alt_reverse: false,
            az_reverse: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub location: SiteProfile,
    #[serde(default)]
    pub encoders: EncodersProfile,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: SiteProfile::default(),
            encoders: EncodersProfile::default(),
        }
    }

    /// Driver configuration for this profile.
    pub fn encoder_config(&self) -> Result<EncoderConfig, ProfileError> {
        let enc = &self.encoders;
        let config = EncoderConfig::new(enc.alt_resolution, enc.az_resolution)
            .map_err(|e: EncoderError| ProfileError::Invalid(e.to_string()))?;
        Ok(config
            .with_reversal(enc.alt_reverse, enc.az_reverse)
            .with_port(enc.serial_port.clone(), enc.serial_speed))
    }

    /// Validated observing site for this profile.
    pub fn observing_location(&self) -> Result<ObservingLocation, ProfileError> {
        let site = &self.location;
        ObservingLocation::new(site.latitude, site.longitude, site.altitude)
            .map_err(|e| ProfileError::Invalid(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ProfileError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ProfileError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CurrentProfile {
    current_profile: String,
}

/// Profile storage rooted at `~/.config/alpacadsc` unless told otherwise.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root_path: PathBuf,
}

impl ProfileStore {
    /// Store at the default location under `$HOME`.
    pub fn new() -> Result<Self, ProfileError> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        let root_path = PathBuf::from(home).join(".config").join("alpacadsc");
        Ok(Self { root_path })
    }

    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn profiles_dir(&self) -> PathBuf {
        self.root_path.join(PROFILES_DIR)
    }

    fn profile_path(&self, name: &str) -> Result<PathBuf, ProfileError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        Ok(self.profiles_dir().join(format!("{name}.json")))
    }

    /// Names of all stored profiles, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>, ProfileError> {
        let dir = self.profiles_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let path = self.profile_path(name)?;
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        Profile::load_from_file(&path)
    }

    /// Write a profile, creating the directory if needed. Returns the file path.
    pub fn save(&self, profile: &Profile) -> Result<PathBuf, ProfileError> {
        let path = self.profile_path(&profile.name)?;
        std::fs::create_dir_all(self.profiles_dir())?;
        profile.save_to_file(&path)?;
        Ok(path)
    }

    /// Returns Ok(true) if the profile was deleted, Ok(false) if it didn't exist.
    pub fn delete(&self, name: &str) -> Result<bool, ProfileError> {
        let path = self.profile_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// Name of the profile selected for startup, if any.
    pub fn current_profile(&self) -> Result<Option<String>, ProfileError> {
        let path = self.root_path.join(CURRENT_PROFILE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        let current: CurrentProfile = serde_json::from_str(&json)?;
        Ok(Some(current.current_profile))
    }

    pub fn set_current_profile(&self, name: &str) -> Result<(), ProfileError> {
        self.profile_path(name)?;
        std::fs::create_dir_all(&self.root_path)?;
        let json = serde_json::to_string_pretty(&CurrentProfile {
            current_profile: name.to_string(),
        })?;
        std::fs::write(self.root_path.join(CURRENT_PROFILE_FILE), json)?;
        Ok(())
    }
}
