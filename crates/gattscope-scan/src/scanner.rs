//! Scan orchestrator: one device, one service, every characteristic

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use gattscope_core::{DatasetError, Identifier, RegistryKind};
use gattscope_transport::{
    Bluetooth, DeviceFilter, GattServer, RequestDeviceOptions, TransportError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::log::{ScanLog, Severity};
use crate::registries::RegistrySet;

/// Apple Inc., the company identifier the chooser filters on by default
pub const DEFAULT_COMPANY_IDENTIFIER: u16 = 0x004C;

/// Device Information service
pub const DEFAULT_SERVICE: u16 = 0x180A;

const UNEXPECTED_STATE_WARNING: &str =
    "[Unexpected] Possible bug with the bluetooth implementation in this browser!";

/// Substring the platform uses when an operation needs a connected server
const CONNECT_FIRST: &str = "connect first";

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanError {
    #[error("Bluetooth adapter missing! Try enabling experimental flag: chrome://flags/#enable-experimental-web-platform-features")]
    AdapterMissing,
    #[error("This device does not have a Bluetooth adapter!")]
    NoAdapter,
    #[error("{0}")]
    DeviceSelection(TransportError),
    #[error("Bluetooth GATT Server not found!")]
    GattServerNotFound,
    #[error("{0}")]
    Connection(TransportError),
    #[error("Unable to connect to Bluetooth GATT Server!")]
    NotConnected,
    #[error("Bluetooth GATT Service not found: {0}")]
    ServiceNotFound(String),
    #[error("{0}")]
    Transport(TransportError),
    /// The platform asked to connect first although the server reported a connection
    #[error("{0}")]
    UnexpectedTransportState(TransportError),
    #[error("Registry dataset unavailable: {0}")]
    Registry(String),
}

impl From<DatasetError> for ScanError {
    fn from(err: DatasetError) -> Self {
        Self::Registry(err.to_string())
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Service whose characteristics are enumerated
    pub service: Identifier,
    /// Offer every device in the chooser instead of filtering
    pub accept_all_devices: bool,
    /// Chooser filters, ignored when `accept_all_devices` is set
    pub filters: Vec<DeviceFilter>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            service: Identifier::from(DEFAULT_SERVICE),
            accept_all_devices: false,
            filters: vec![DeviceFilter {
                company_identifier: Some(DEFAULT_COMPANY_IDENTIFIER),
                ..Default::default()
            }],
        }
    }
}

impl ScannerConfig {
    /// Chooser options granting access to the configured service
    pub fn request_options(&self) -> RequestDeviceOptions {
        RequestDeviceOptions {
            accept_all_devices: self.accept_all_devices,
            filters: if self.accept_all_devices {
                Vec::new()
            } else {
                self.filters.clone()
            },
            optional_services: vec![self.service.clone()],
        }
    }
}

/// Scan event for real-time updates
#[derive(Debug, Clone)]
pub enum ScanEvent {
    ScanStarted,
    /// Line appended to the log sink
    Log(String),
    /// Line appended to the error sink
    Error { severity: Severity, line: String },
    ScanCompleted { success: bool, characteristics: usize, failed_reads: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub identifier: Identifier,
    pub code: String,
    pub name: String,
}

/// Outcome of reading one characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicReading {
    pub uuid: Identifier,
    pub code: String,
    pub name: String,
    /// UTF-8 decoded value, or the read failure
    pub value: Result<String, TransportError>,
}

/// Everything a scan produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub device: Option<DeviceSummary>,
    pub service: Option<ServiceSummary>,
    pub characteristics: Vec<CharacteristicReading>,
    pub log: ScanLog,
    pub outcome: Result<(), ScanError>,
}

impl ScanReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failed_reads(&self) -> impl Iterator<Item = &CharacteristicReading> {
        self.characteristics.iter().filter(|c| c.value.is_err())
    }
}

/// Mutable state of one scan invocation
struct ScanRun<'a> {
    event_tx: &'a broadcast::Sender<ScanEvent>,
    log: ScanLog,
    connected: bool,
    device: Option<DeviceSummary>,
    service: Option<ServiceSummary>,
    characteristics: Vec<CharacteristicReading>,
}

impl<'a> ScanRun<'a> {
    fn new(event_tx: &'a broadcast::Sender<ScanEvent>) -> Self {
        Self {
            event_tx,
            log: ScanLog::new(),
            connected: false,
            device: None,
            service: None,
            characteristics: Vec::new(),
        }
    }

    fn print_log(&mut self, name: &str, value: impl std::fmt::Display) {
        let line = self.log.log(name, value);
        info!("{}", line);
        let _ = self.event_tx.send(ScanEvent::Log(line));
    }

    fn print_error(&mut self, severity: Severity, message: impl std::fmt::Display) {
        let line = self.log.error(severity, message);
        match severity {
            Severity::Warn => warn!("{}", line),
            Severity::Error => tracing::error!("{}", line),
        }
        let _ = self.event_tx.send(ScanEvent::Error { severity, line });
    }

    /// Tag a transport failure, spotting "connect first" errors on a connected server
    fn classify(&self, err: TransportError, fallback: fn(TransportError) -> ScanError) -> ScanError {
        if self.connected && err.message.contains(CONNECT_FIRST) {
            ScanError::UnexpectedTransportState(err)
        } else {
            fallback(err)
        }
    }

    /// Render a failure into the error sink
    fn report_failure(&mut self, err: &ScanError) {
        match err {
            ScanError::AdapterMissing => self.print_error(Severity::Warn, err),
            ScanError::UnexpectedTransportState(_) => {
                self.print_error(Severity::Warn, UNEXPECTED_STATE_WARNING);
                self.print_error(Severity::Error, err);
            }
            _ => self.print_error(Severity::Error, err),
        }
    }
}

/// Drives the transport through one scan and resolves every name it meets
pub struct ScanOrchestrator {
    bluetooth: Option<Arc<dyn Bluetooth>>,
    registries: Arc<RegistrySet>,
    config: Arc<RwLock<ScannerConfig>>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl ScanOrchestrator {
    /// Create an orchestrator; `bluetooth` is `None` when the platform has no Bluetooth capability
    pub fn new(
        bluetooth: Option<Arc<dyn Bluetooth>>,
        registries: Arc<RegistrySet>,
        config: ScannerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            bluetooth,
            registries,
            config: Arc::new(RwLock::new(config)),
            event_tx,
        }
    }

    /// Subscribe to scan events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    pub fn registries(&self) -> &Arc<RegistrySet> {
        &self.registries
    }

    /// Change the service enumerated by subsequent scans
    pub async fn set_service(&self, service: Identifier) {
        let mut config = self.config.write().await;
        info!(service = %service, "Scan service updated");
        config.service = service;
    }

    /// Run a single scan. Failures are recorded in the report, never returned.
    pub async fn scan(&self) -> ScanReport {
        let _ = self.event_tx.send(ScanEvent::ScanStarted);
        let started_at = Utc::now();

        // Get a snapshot of config for this scan
        let config = self.config.read().await.clone();
        info!(service = %config.service, "Starting scan");

        let mut run = ScanRun::new(&self.event_tx);
        let outcome = self.run(&config, &mut run).await;
        if let Err(err) = &outcome {
            run.report_failure(err);
        }

        let failed_reads = run.characteristics.iter().filter(|c| c.value.is_err()).count();
        let _ = self.event_tx.send(ScanEvent::ScanCompleted {
            success: outcome.is_ok(),
            characteristics: run.characteristics.len(),
            failed_reads,
        });

        info!(
            success = outcome.is_ok(),
            characteristics = run.characteristics.len(),
            failed_reads,
            "Scan complete"
        );

        ScanReport {
            started_at,
            finished_at: Utc::now(),
            device: run.device,
            service: run.service,
            characteristics: run.characteristics,
            log: run.log,
            outcome,
        }
    }

    async fn run(&self, config: &ScannerConfig, run: &mut ScanRun<'_>) -> Result<(), ScanError> {
        let bluetooth = self.bluetooth.as_ref().ok_or(ScanError::AdapterMissing)?;

        let available = bluetooth
            .availability()
            .await
            .map_err(|e| run.classify(e, ScanError::Transport))?;
        if !available {
            return Err(ScanError::NoAdapter);
        }

        // Characteristic names are needed once the device answers
        let characteristics = self.registries.ensure_characteristics().await?;

        let device = bluetooth
            .request_device(&config.request_options())
            .await
            .map_err(|e| run.classify(e, ScanError::DeviceSelection))?;

        for conflict in self.registries.conflicts().await {
            run.print_error(Severity::Warn, conflict);
        }

        run.device = Some(DeviceSummary {
            id: device.id(),
            name: device.name(),
        });
        run.print_log("device.name", device.name().unwrap_or_default());
        run.print_log("device.id", device.id());

        let gatt = device.gatt().ok_or(ScanError::GattServerNotFound)?;
        run.print_log("device.connected", gatt.connected());

        let server: Box<dyn GattServer> = if gatt.connected() {
            gatt
        } else {
            let server = gatt
                .connect()
                .await
                .map_err(|e| run.classify(e, ScanError::Connection))?;
            run.print_log("device.connected", server.connected());
            server
        };

        if !server.connected() {
            return Err(ScanError::NotConnected);
        }
        run.connected = true;
        run.print_log("------", "------");

        let service = server
            .primary_service(&config.service)
            .await
            .map_err(|e| run.classify(e, ScanError::Transport))?
            .ok_or_else(|| ScanError::ServiceNotFound(config.service.normalize()))?;

        let service_name = self
            .registries
            .resolve_name(RegistryKind::Service, &config.service)
            .await;
        let service_code = self.registries.services().await.registry.code_of(&config.service);
        run.service = Some(ServiceSummary {
            identifier: config.service.clone(),
            code: service_code,
            name: service_name.clone(),
        });
        run.print_log("service.name", &service_name);

        let chars = service
            .characteristics()
            .await
            .map_err(|e| run.classify(e, ScanError::Transport))?;
        run.print_log("characteristics.count", chars.len());

        let values = join_all(chars.iter().map(|c| c.read_value())).await;

        for (characteristic, value) in chars.iter().zip(values) {
            let uuid = characteristic.uuid();
            let name = characteristics.registry.resolve_name(&uuid);

            let value = match value {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    run.print_log(&name, &text);
                    Ok(text)
                }
                Err(err) => {
                    warn!(characteristic = %name, uuid = %uuid, error = %err, "Characteristic read failed");
                    Err(err)
                }
            };

            run.characteristics.push(CharacteristicReading {
                code: characteristics.registry.code_of(&uuid),
                uuid,
                name,
                value,
            });
        }

        debug!(read = run.characteristics.len(), "Characteristics enumerated");
        Ok(())
    }
}
