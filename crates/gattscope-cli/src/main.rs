//! gattscope - Main entry point
//!
//! Scans one peripheral's GATT service and resolves service and
//! characteristic names against the assigned-number registries.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gattscope_core::{Identifier, RegistryKind};
use gattscope_scan::{RegistrySet, ScanOrchestrator, ScanReport};
use gattscope_transport::{Bluetooth, DeviceProfile, SimulatedBluetooth};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gattscope")]
#[command(about = "Bluetooth GATT scanner with assigned-number name resolution")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gattscope.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a device and read every characteristic of one service (default)
    Scan {
        /// Simulated device profile (overrides the config file)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Service to enumerate: number, UUID, or short name (overrides the config file)
        #[arg(long)]
        service: Option<String>,

        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve an identifier against a registry
    Resolve {
        #[arg(value_enum)]
        kind: KindArg,
        /// Number (0x180A), UUID, or short name
        identifier: String,
    },
    /// List every registered code and name of a registry
    List {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// List short-name conflicts in both registries
    Conflicts,
    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "gattscope.toml")]
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Service,
    Characteristic,
}

impl From<KindArg> for RegistryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Service => RegistryKind::Service,
            KindArg::Characteristic => RegistryKind::Characteristic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("gattscope v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    match args.command.unwrap_or(Command::Scan {
        profile: None,
        service: None,
        json: false,
    }) {
        Command::Scan {
            profile,
            service,
            json,
        } => {
            if let Some(profile) = profile {
                config.transport.profile = Some(profile);
            }
            if let Some(service) = service {
                config.scan.service = Identifier::parse(&service);
            }

            let registries = RegistrySet::new(
                &config.registry.service_source(),
                config.registry.characteristic_source(),
            )?;
            let bluetooth = load_transport(&config.transport)?;
            let scanner = ScanOrchestrator::new(
                bluetooth,
                Arc::new(registries),
                config.to_scanner_config(),
            );

            let report = scanner.scan().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Command::Resolve { kind, identifier } => {
            let kind = RegistryKind::from(kind);
            let (registry, _) = config.registry.source(kind).build(kind)?;
            let identifier = Identifier::parse(&identifier);

            match registry.lookup(&identifier) {
                Some(item) => println!("{}  {}  ({})", item.code, item.name, item.id),
                None => println!("{}  {}", identifier.normalize(), registry.resolve_name(&identifier)),
            }
        }
        Command::List { kind } => {
            let kind = RegistryKind::from(kind);
            let (registry, _) = config.registry.source(kind).build(kind)?;
            for item in registry.items() {
                println!("{:<8}  {:<40}  {}", item.code, item.name, item.short_id);
            }
        }
        Command::Conflicts => {
            let registries = RegistrySet::new(
                &config.registry.service_source(),
                config.registry.characteristic_source(),
            )?;
            registries.ensure_characteristics().await?;

            let conflicts = registries.conflicts().await;
            if conflicts.is_empty() {
                println!("No registry conflicts");
            }
            for conflict in conflicts {
                println!("{}", conflict);
            }
        }
        Command::InitConfig { path } => {
            config::save_default_config(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

/// Build the transport the configuration asks for; `None` means no Bluetooth capability
fn load_transport(transport: &config::TransportConfig) -> Result<Option<Arc<dyn Bluetooth>>> {
    if !transport.enabled {
        info!("Bluetooth transport disabled by configuration");
        return Ok(None);
    }
    match transport.profile.as_deref() {
        Some(path) => {
            let bluetooth: Arc<dyn Bluetooth> = Arc::new(load_profile(path)?);
            Ok(Some(bluetooth))
        }
        None => {
            info!("No device profile configured, no Bluetooth capability available");
            Ok(None)
        }
    }
}

fn load_profile(path: &Path) -> Result<SimulatedBluetooth> {
    let profile = DeviceProfile::from_file(path)
        .with_context(|| format!("loading device profile {}", path.display()))?;
    info!(path = %path.display(), devices = profile.devices.len(), "Loaded device profile");
    Ok(SimulatedBluetooth::new(profile))
}

fn print_report(report: &ScanReport) {
    println!("Logs:");
    for line in report.log.logs.entries() {
        println!("  {}", line);
    }
    println!("Error:");
    for line in report.log.errors.entries() {
        println!("  {}", line);
    }

    let failed: Vec<_> = report.failed_reads().collect();
    if !failed.is_empty() {
        println!("Failed reads:");
        for reading in failed {
            if let Err(err) = &reading.value {
                println!("  {} ({}): {}", reading.name, reading.code, err);
            }
        }
    }
}
