//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "binary"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Binary entrypoint for the tf-emu daemon."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tf_emu_common::{init_tracing, AppConfig};
use tf_emu_core::{DeviceCatalog, EmulatorOrchestrator};
use tf_emu_msg::{HandlerRegistry, InMemoryBus};
use tokio::signal;
use tracing::info;

mod brickd;

use brickd::BrickdServer;

#[derive(Debug, Parser)]
#[command(author, version, about = "Tinkerforge brick and bricklet emulator", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "ADDR", help = "Override the brickd listen address")]
    listen: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the configured devices")]
    Run,
    #[command(about = "List the built-in device types")]
    Devices {
        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct DeviceTypeSummary<'a> {
    key: &'a str,
    display_name: &'a str,
    device_identifier: u16,
    functions: usize,
    callbacks: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let catalog = Arc::new(DeviceCatalog::builtin()?);

    if let Some(Commands::Devices { json }) = &cli.command {
        return list_devices(&catalog, *json);
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/tf-emu.toml"));
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(listen) = cli.listen {
        config.brickd.listen = listen;
    }
    init_tracing("tf-emud", &config.logging)?;
    info!(config_path = %loaded.source.display(), devices = config.devices.len(), "configuration loaded");

    run_daemon(config, catalog).await
}

fn list_devices(catalog: &DeviceCatalog, json: bool) -> Result<()> {
    let summaries: Vec<_> = catalog
        .iter()
        .map(|profile| DeviceTypeSummary {
            key: profile.key(),
            display_name: &profile.device().display_name,
            device_identifier: profile.device().device_identifier,
            functions: profile.table().len(),
            callbacks: profile.callbacks().len(),
        })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    println!("{:<14} {:>6}  {:<24} {:>9} {:>9}", "KEY", "ID", "NAME", "FUNCTIONS", "CALLBACKS");
    for summary in summaries {
        println!(
            "{:<14} {:>6}  {:<24} {:>9} {:>9}",
            summary.key,
            summary.device_identifier,
            summary.display_name,
            summary.functions,
            summary.callbacks
        );
    }
    Ok(())
}

async fn run_daemon(config: AppConfig, catalog: Arc<DeviceCatalog>) -> Result<()> {
    let brickd_settings = config.brickd.clone();
    let bus = InMemoryBus::new();
    let registry = HandlerRegistry::new();

    let orchestrator = EmulatorOrchestrator::new(config, catalog, bus.clone(), registry.clone());
    let handle = orchestrator.start().await?;

    let brickd = if brickd_settings.enabled {
        let server = BrickdServer::spawn(brickd_settings.listen, bus, registry).await?;
        info!(address = %server.addr(), "brickd front listening");
        Some(server)
    } else {
        info!("brickd front disabled by configuration");
        None
    };

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    if let Some(server) = brickd {
        server.shutdown().await?;
    }
    handle.shutdown().await?;
    Ok(())
}
