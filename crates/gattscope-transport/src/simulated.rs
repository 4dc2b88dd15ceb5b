//! Simulated Bluetooth backend driven by a TOML device profile
//!
//! The profile describes the adapter and the peripherals in range. The
//! backend follows the platform's observable behaviour closely enough to
//! exercise every branch of a scan: chooser filtering, missing GATT servers,
//! connection failures, services outside `optional_services`, per-value read
//! failures, and connections that drop underneath the caller.

use async_trait::async_trait;
use gattscope_core::Identifier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::transport::{
    same_attribute, Bluetooth, BluetoothDevice, DeviceFilter, GattCharacteristic, GattServer,
    GattService, RequestDeviceOptions, Result, TransportError,
};

const CHOOSER_CANCELLED: &str = "User cancelled the requestDevice() chooser.";
const SERVICE_NOT_ALLOWED: &str = "Origin is not allowed to access the service. Tip: Add the service UUID to 'optionalServices' in requestDevice() options.";
const SERVICES_DISCONNECTED: &str =
    "GATT Server is disconnected. Cannot retrieve services. (Re)connect first with `device.gatt.connect`.";
const OPERATION_DISCONNECTED: &str =
    "GATT Server is disconnected. Cannot perform GATT operations. (Re)connect first with `device.gatt.connect`.";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read device profile: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse device profile: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Adapter and peripherals visible to the simulated backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Whether a Bluetooth adapter is present
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, rename = "device")]
    pub devices: Vec<SimulatedDeviceProfile>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            available: true,
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedDeviceProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Company identifier carried in the advertised manufacturer data
    #[serde(default)]
    pub company_identifier: Option<u16>,
    /// Whether the device exposes a GATT server at all
    #[serde(default = "default_true")]
    pub gatt: bool,
    /// Whether the GATT server is already connected when the device is chosen
    #[serde(default)]
    pub connected: bool,
    /// Error message returned by `connect()`
    #[serde(default)]
    pub connect_error: Option<String>,
    /// Report the server as connected while every GATT operation fails as disconnected
    #[serde(default)]
    pub stale_connection: bool,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub uuid: Identifier,
    #[serde(default, rename = "characteristic")]
    pub characteristics: Vec<CharacteristicProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicProfile {
    pub uuid: Identifier,
    /// UTF-8 text value
    #[serde(default)]
    pub value: Option<String>,
    /// Raw value, used when `value` is absent
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
    /// Error message returned by `read_value()`
    #[serde(default)]
    pub read_error: Option<String>,
}

fn default_true() -> bool {
    true
}

impl DeviceProfile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> std::result::Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a profile from a TOML string
    pub fn from_toml(content: &str) -> std::result::Result<Self, ProfileError> {
        let profile: DeviceProfile = toml::from_str(content)?;
        Ok(profile)
    }
}

impl SimulatedDeviceProfile {
    fn matches(&self, filter: &DeviceFilter) -> bool {
        if let Some(name) = &filter.name {
            if self.name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &filter.name_prefix {
            if !self
                .name
                .as_deref()
                .map(|name| name.starts_with(prefix.as_str()))
                .unwrap_or(false)
            {
                return false;
            }
        }
        if let Some(company) = filter.company_identifier {
            if self.company_identifier != Some(company) {
                return false;
            }
        }
        filter
            .services
            .iter()
            .all(|wanted| self.services.iter().any(|s| same_attribute(&s.uuid, wanted)))
    }
}

/// [`Bluetooth`] implementation backed by a [`DeviceProfile`]
#[derive(Debug, Clone)]
pub struct SimulatedBluetooth {
    profile: Arc<DeviceProfile>,
}

impl SimulatedBluetooth {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile: Arc::new(profile),
        }
    }
}

#[async_trait]
impl Bluetooth for SimulatedBluetooth {
    async fn availability(&self) -> Result<bool> {
        Ok(self.profile.available)
    }

    async fn request_device(&self, options: &RequestDeviceOptions) -> Result<Box<dyn BluetoothDevice>> {
        options.validate()?;

        let chosen = self.profile.devices.iter().find(|device| {
            options.accept_all_devices || options.filters.iter().any(|f| device.matches(f))
        });

        let device = chosen.ok_or_else(|| TransportError::not_found(CHOOSER_CANCELLED))?;
        debug!(device = %device.id, name = ?device.name, "Simulated device chosen");

        Ok(Box::new(SimulatedDevice {
            connection: Arc::new(Connection {
                profile: device.clone(),
                allowed_services: options.allowed_services(),
                connected: AtomicBool::new(device.connected),
            }),
        }))
    }
}

/// State shared by every handle derived from one chosen device
#[derive(Debug)]
struct Connection {
    profile: SimulatedDeviceProfile,
    allowed_services: Vec<Identifier>,
    connected: AtomicBool,
}

impl Connection {
    fn ensure_usable(&self, message: &str) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) && !self.profile.stale_connection {
            Ok(())
        } else {
            Err(TransportError::network(message))
        }
    }
}

struct SimulatedDevice {
    connection: Arc<Connection>,
}

impl BluetoothDevice for SimulatedDevice {
    fn name(&self) -> Option<String> {
        self.connection.profile.name.clone()
    }

    fn id(&self) -> String {
        self.connection.profile.id.clone()
    }

    fn gatt(&self) -> Option<Box<dyn GattServer>> {
        if !self.connection.profile.gatt {
            return None;
        }
        Some(Box::new(SimulatedServer {
            connection: self.connection.clone(),
        }))
    }
}

struct SimulatedServer {
    connection: Arc<Connection>,
}

#[async_trait]
impl GattServer for SimulatedServer {
    fn connected(&self) -> bool {
        self.connection.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<Box<dyn GattServer>> {
        if let Some(message) = &self.connection.profile.connect_error {
            return Err(TransportError::network(message.clone()));
        }
        self.connection.connected.store(true, Ordering::SeqCst);
        debug!(device = %self.connection.profile.id, "Simulated GATT server connected");
        Ok(Box::new(SimulatedServer {
            connection: self.connection.clone(),
        }))
    }

    async fn primary_service(&self, service: &Identifier) -> Result<Option<Box<dyn GattService>>> {
        self.connection.ensure_usable(SERVICES_DISCONNECTED)?;

        if !self
            .connection
            .allowed_services
            .iter()
            .any(|allowed| same_attribute(allowed, service))
        {
            return Err(TransportError::security(SERVICE_NOT_ALLOWED));
        }

        let found = self
            .connection
            .profile
            .services
            .iter()
            .position(|s| same_attribute(&s.uuid, service));

        Ok(found.map(|index| {
            Box::new(SimulatedService {
                connection: self.connection.clone(),
                index,
            }) as Box<dyn GattService>
        }))
    }
}

struct SimulatedService {
    connection: Arc<Connection>,
    index: usize,
}

impl SimulatedService {
    fn profile(&self) -> &ServiceProfile {
        &self.connection.profile.services[self.index]
    }
}

#[async_trait]
impl GattService for SimulatedService {
    fn uuid(&self) -> Identifier {
        self.profile().uuid.clone()
    }

    async fn characteristics(&self) -> Result<Vec<Box<dyn GattCharacteristic>>> {
        self.connection.ensure_usable(OPERATION_DISCONNECTED)?;

        Ok(self
            .profile()
            .characteristics
            .iter()
            .map(|profile| {
                Box::new(SimulatedCharacteristic {
                    connection: self.connection.clone(),
                    profile: profile.clone(),
                }) as Box<dyn GattCharacteristic>
            })
            .collect())
    }
}

struct SimulatedCharacteristic {
    connection: Arc<Connection>,
    profile: CharacteristicProfile,
}

#[async_trait]
impl GattCharacteristic for SimulatedCharacteristic {
    fn uuid(&self) -> Identifier {
        self.profile.uuid.clone()
    }

    async fn read_value(&self) -> Result<Vec<u8>> {
        self.connection.ensure_usable(OPERATION_DISCONNECTED)?;

        if let Some(message) = &self.profile.read_error {
            return Err(TransportError::not_supported(message.clone()));
        }

        let value = match (&self.profile.value, &self.profile.bytes) {
            (Some(text), _) => text.as_bytes().to_vec(),
            (None, Some(bytes)) => bytes.clone(),
            (None, None) => Vec::new(),
        };
        trace!(uuid = %self.profile.uuid, len = value.len(), "Simulated characteristic read");
        Ok(value)
    }
}
