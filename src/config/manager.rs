use super::{deploy::DeployConfig, search::SearchConfig, traits::ConfigSection};
use crate::error::TradeGridError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ribs: SearchConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), TradeGridError> {
        self.ribs.validate()?;
        self.deploy.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a YAML (or JSON) config file. Missing sections fall back to
    /// compiled-in defaults.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TradeGridError> {
        let source = config::File::from(path.as_ref());
        let raw = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| TradeGridError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = raw
            .try_deserialize()
            .map_err(|e| TradeGridError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap() = config;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn update<F>(&self, f: F) -> Result<(), TradeGridError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap();
        f(&mut config);
        config.validate()?;
        Ok(())
    }
}
