//! gattscope Transport - Bluetooth GATT transport boundary
//!
//! This crate defines the traits the scanner drives and ships a simulated
//! backend configured from a TOML device profile.

pub mod simulated;
pub mod transport;

pub use simulated::{DeviceProfile, ProfileError, SimulatedBluetooth};
pub use transport::{
    Bluetooth, BluetoothDevice, DeviceFilter, GattCharacteristic, GattServer, GattService,
    RequestDeviceOptions, TransportError, TransportErrorKind,
};
