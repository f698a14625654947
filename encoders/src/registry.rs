use std::collections::BTreeMap;

use crate::config::EncoderConfig;
use crate::daveek::DaveEkEncoders;
use crate::driver::EncoderDriver;
use crate::error::{EncoderError, EncoderResult};
use crate::generic::GenericEncoders;
use crate::simulator::SimulatorEncoders;

/// Builds a driver from its configuration.
pub type DriverFactory = Box<dyn Fn(EncoderConfig) -> Box<dyn EncoderDriver> + Send + Sync>;

/// Static map from driver name to constructor, filled at startup.
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the DaveEk, Generic and Simulator drivers.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::empty();
        registry.register(DaveEkEncoders::NAME, |config| {
            Box::new(DaveEkEncoders::new(config))
        });
        registry.register(GenericEncoders::NAME, |config| {
            Box::new(GenericEncoders::new(config))
        });
        registry.register(SimulatorEncoders::NAME, |config| {
            Box::new(SimulatorEncoders::new(config))
        });
        registry
    }

    /// Add or replace a constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(EncoderConfig) -> Box<dyn EncoderDriver> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct the named driver; an unknown name is a configuration error.
    pub fn create(&self, name: &str, config: EncoderConfig) -> EncoderResult<Box<dyn EncoderDriver>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EncoderError::UnknownDriver(name.to_string()))?;
        Ok(factory(config))
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin_drivers()
    }
}
