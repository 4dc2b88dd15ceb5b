//! gattscope Scan - Drives one GATT scan and resolves the names it meets
//!
//! This crate provides:
//! - The registry set (services built eagerly, characteristics lazily)
//! - The scan orchestrator with its log and error sinks
//! - Scan reports with per-characteristic read results

pub mod log;
pub mod registries;
pub mod scanner;

pub use log::{LogSink, ScanLog, Severity};
pub use registries::{LoadedRegistry, RegistrySet};
pub use scanner::{
    CharacteristicReading, DeviceSummary, ScanError, ScanEvent, ScanOrchestrator, ScanReport,
    ScannerConfig, ServiceSummary,
};
