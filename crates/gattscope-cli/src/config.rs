//! Configuration loading and validation

use anyhow::Result;
use gattscope_core::{DatasetSource, Identifier, RegistryKind};
use gattscope_scan::scanner::{DEFAULT_COMPANY_IDENTIFIER, DEFAULT_SERVICE};
use gattscope_scan::ScannerConfig;
use gattscope_transport::DeviceFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Registry dataset locations; bundled datasets are used when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub services: Option<PathBuf>,
    #[serde(default)]
    pub characteristics: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn service_source(&self) -> DatasetSource {
        DatasetSource::from_path(self.services.as_deref())
    }

    pub fn characteristic_source(&self) -> DatasetSource {
        DatasetSource::from_path(self.characteristics.as_deref())
    }

    pub fn source(&self, kind: RegistryKind) -> DatasetSource {
        match kind {
            RegistryKind::Service => self.service_source(),
            RegistryKind::Characteristic => self.characteristic_source(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Service to enumerate (number, UUID text, or short name)
    #[serde(default = "default_service")]
    pub service: Identifier,
    #[serde(default)]
    pub accept_all_devices: bool,
    #[serde(default = "default_filters")]
    pub filters: Vec<DeviceFilter>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            accept_all_devices: false,
            filters: default_filters(),
        }
    }
}

fn default_service() -> Identifier {
    Identifier::from(DEFAULT_SERVICE)
}

fn default_filters() -> Vec<DeviceFilter> {
    vec![DeviceFilter {
        company_identifier: Some(DEFAULT_COMPANY_IDENTIFIER),
        ..Default::default()
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Whether a Bluetooth capability is offered at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Device profile for the simulated backend
    #[serde(default)]
    pub profile: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profile: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            service: self.scan.service.clone(),
            accept_all_devices: self.scan.accept_all_devices,
            filters: self.scan.filters.clone(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
