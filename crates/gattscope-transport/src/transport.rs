//! Bluetooth GATT transport boundary
//!
//! The platform that talks to real peripherals is external to gattscope.
//! These traits describe the part of it the scanner needs: device selection,
//! connecting to the GATT server, primary service lookup, characteristic
//! enumeration, and value reads.

use async_trait::async_trait;
use gattscope_core::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error categories reported by the platform, named after the DOM exceptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    NotFound,
    Network,
    Security,
    NotSupported,
    Type,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFoundError",
            Self::Network => "NetworkError",
            Self::Security => "SecurityError",
            Self::NotSupported => "NotSupportedError",
            Self::Type => "TypeError",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Security, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotSupported, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Type, message)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One entry of the device chooser filter list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// Exact advertised name
    #[serde(default)]
    pub name: Option<String>,
    /// Advertised name prefix
    #[serde(default)]
    pub name_prefix: Option<String>,
    /// Bluetooth SIG company identifier in the manufacturer data, e.g. 0x004C
    #[serde(default)]
    pub company_identifier: Option<u16>,
    /// Services the device must advertise
    #[serde(default)]
    pub services: Vec<Identifier>,
}

/// Options for [`Bluetooth::request_device`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeviceOptions {
    #[serde(default)]
    pub accept_all_devices: bool,
    #[serde(default)]
    pub filters: Vec<DeviceFilter>,
    /// Services the caller may access besides those in `filters`
    #[serde(default)]
    pub optional_services: Vec<Identifier>,
}

impl RequestDeviceOptions {
    /// Exactly one of `accept_all_devices` and a non-empty `filters` is allowed
    pub fn validate(&self) -> Result<()> {
        match (self.accept_all_devices, self.filters.is_empty()) {
            (true, false) => Err(TransportError::type_error(
                "Cannot set both 'filters' and 'acceptAllDevices'.",
            )),
            (false, true) => Err(TransportError::type_error(
                "Either 'filters' should be present or 'acceptAllDevices' should be true, but not both.",
            )),
            _ => Ok(()),
        }
    }

    /// Every service the caller asked permission for
    pub fn allowed_services(&self) -> Vec<Identifier> {
        self.filters
            .iter()
            .flat_map(|f| f.services.iter())
            .chain(self.optional_services.iter())
            .cloned()
            .collect()
    }
}

/// Whether two identifiers name the same attribute
pub fn same_attribute(a: &Identifier, b: &Identifier) -> bool {
    a == b || a.normalize() == b.normalize()
}

/// Entry point of the platform capability
#[async_trait]
pub trait Bluetooth: Send + Sync {
    /// Whether any Bluetooth adapter is present
    async fn availability(&self) -> Result<bool>;

    /// Let the user pick a device matching `options`
    async fn request_device(&self, options: &RequestDeviceOptions) -> Result<Box<dyn BluetoothDevice>>;
}

/// A device returned from the chooser
pub trait BluetoothDevice: Send + Sync {
    fn name(&self) -> Option<String>;

    fn id(&self) -> String;

    /// GATT server handle, `None` when the device exposes no GATT server
    fn gatt(&self) -> Option<Box<dyn GattServer>>;
}

#[async_trait]
pub trait GattServer: Send + Sync {
    fn connected(&self) -> bool;

    /// Connect and return the connected server handle
    async fn connect(&self) -> Result<Box<dyn GattServer>>;

    /// Look up a primary service, `None` when the device has no such service
    async fn primary_service(&self, service: &Identifier) -> Result<Option<Box<dyn GattService>>>;
}

#[async_trait]
pub trait GattService: Send + Sync {
    fn uuid(&self) -> Identifier;

    /// Characteristics in the order the device reports them
    async fn characteristics(&self) -> Result<Vec<Box<dyn GattCharacteristic>>>;
}

#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Identifier;

    async fn read_value(&self) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::network("GATT Server is disconnected.");
        assert_eq!(err.to_string(), "NetworkError: GATT Server is disconnected.");
    }

    #[test]
    fn test_options_validation() {
        let mut options = RequestDeviceOptions::default();
        assert_eq!(options.validate().unwrap_err().kind, TransportErrorKind::Type);

        options.accept_all_devices = true;
        assert!(options.validate().is_ok());

        options.filters.push(DeviceFilter::default());
        assert!(options.validate().is_err());

        options.accept_all_devices = false;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_allowed_services() {
        let options = RequestDeviceOptions {
            accept_all_devices: false,
            filters: vec![DeviceFilter {
                services: vec![Identifier::parse("battery_service")],
                ..Default::default()
            }],
            optional_services: vec![Identifier::from(0x180Au16)],
        };
        assert_eq!(
            options.allowed_services(),
            vec![Identifier::parse("battery_service"), Identifier::from(0x180Au16)]
        );
    }

    #[test]
    fn test_same_attribute() {
        assert!(same_attribute(
            &Identifier::from(0x180Au16),
            &Identifier::parse("0000180a-0000-1000-8000-00805f9b34fb")
        ));
        assert!(same_attribute(&Identifier::from(0x180Au16), &Identifier::parse("0x180A")));
        assert!(!same_attribute(
            &Identifier::from(0x180Au16),
            &Identifier::parse("device_information")
        ));
    }
}
