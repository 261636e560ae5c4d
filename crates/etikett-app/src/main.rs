// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett — label print gateway.
//
// Entry point. Initialises logging, loads configuration and registries, then
// runs the stream listener, job processor, event hub and HTTP server until
// Ctrl-C.

mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use etikett_core::config::GatewayConfig;
use etikett_core::error::Result;
use etikett_core::registry::{DeviceRegistry, RegistryStore, TemplateTable};
use etikett_print::{Dispatcher, EventHub, JobProcessor, JobQueue, StreamListener, StreamSettings};

use server::AppState;

#[derive(Parser, Debug)]
#[command(name = "etikett")]
#[command(author, version, about = "Label print gateway for ZPL printers", long_about = None)]
struct Cli {
    /// Raw TCP job intake port
    stream_port: Option<u16>,

    /// HTTP port (job intake, management, event streams)
    http_port: Option<u16>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding index.html
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,
}

impl Cli {
    /// File settings (or defaults), overridden by command-line values.
    fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)?,
            None => GatewayConfig::default(),
        };
        if let Some(port) = self.stream_port {
            config.stream_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(home) = &self.home {
            config.home_dir = home.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Etikett starting");

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Etikett stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.gateway_config()?;
    let registry = Arc::new(load_registry(&config));

    let hub = EventHub::spawn(config.events.subscriber_buffer);
    let dispatcher = Arc::new(Dispatcher::tcp(config.dispatch.clone()));
    let (jobs, pending) = JobQueue::bounded(config.queue_capacity);

    let processor = Arc::new(JobProcessor::new(
        Arc::clone(&registry),
        Arc::clone(&dispatcher),
        hub.clone(),
    ));
    tokio::spawn(processor.run(pending));

    let stream_addr = SocketAddr::from(([0, 0, 0, 0], config.stream_port));
    let mut listener = StreamListener::new(stream_addr, StreamSettings::from(&config));
    listener.start(jobs.clone()).await?;

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = Arc::new(AppState::new(config, registry, dispatcher, hub, jobs));

    tokio::select! {
        served = server::serve(state, http_addr) => served?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    listener.stop().await?;
    info!("Etikett stopped");
    Ok(())
}

/// Initial registry snapshots. Missing files start the gateway with empty
/// tables; `/reloadPrinter` and `/reloadLabels` can fill them later.
fn load_registry(config: &GatewayConfig) -> RegistryStore {
    let devices = DeviceRegistry::load(&config.printer_file).unwrap_or_else(|e| {
        warn!(error = %e, "no device registry, starting without printers");
        DeviceRegistry::new()
    });
    let templates = TemplateTable::load_dir(&config.labels_dir).unwrap_or_else(|e| {
        warn!(error = %e, "no label templates, starting without templates");
        TemplateTable::new()
    });
    RegistryStore::new(devices, templates)
}
