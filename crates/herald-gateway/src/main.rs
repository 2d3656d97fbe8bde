//! # herald-gateway
//!
//! Herald gateway binary: loads settings, wires admission, the broker
//! consumer and the WebSocket server, then runs until SIGINT/SIGTERM.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use herald_auth::{AdmissionGate, HttpIdentityVerifier};
use herald_broker::AmqpBroker;
use herald_server::shutdown::wait_for_signal;
use herald_server::{ConnectionRegistry, EventRouter, GatewayServer, QueueConsumer, ServerConfig};
use herald_settings::GatewaySettings;

/// Herald real-time event gateway.
#[derive(Parser, Debug)]
#[command(name = "herald-gateway", about = "Herald real-time event gateway")]
struct Cli {
    /// Settings file (defaults to `~/.herald/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<GatewaySettings> {
        let mut settings = match &self.config {
            Some(path) => herald_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => herald_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    /// CLI flags win over file and environment.
    fn apply(&self, settings: &mut GatewaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;
    logging::init(&settings.logging);

    let metrics = match herald_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    // Admission
    let verifier = HttpIdentityVerifier::new(settings.auth.api_url.clone(), settings.auth.timeout())
        .context("Failed to build identity verifier client")?;
    let gate = AdmissionGate::with_timeout(Arc::new(verifier), settings.auth.timeout());

    // Server
    let registry = Arc::new(ConnectionRegistry::new());
    let mut server = GatewayServer::new(
        ServerConfig::from(&settings.server),
        gate,
        Arc::clone(&registry),
    );
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }
    let (addr, listener) = server.listen().await.context("Failed to bind server")?;

    // Queue consumer
    let broker = AmqpBroker::new(settings.broker.amqp_uri(), settings.broker.display_addr());
    let consumer = QueueConsumer::new(
        Arc::new(broker),
        Arc::new(EventRouter::new(registry)),
        settings.broker.queue_name.clone(),
        settings.broker.retry_policy(),
    );
    let token = server.shutdown().token();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(token).await {
            tracing::error!(error = %e, "queue consumer stopped");
        }
    });

    tracing::info!(
        %addr,
        auth_api = %settings.auth.api_url,
        queue = %settings.broker.queue_name,
        "herald gateway started"
    );

    wait_for_signal().await;

    let stragglers = server
        .shutdown()
        .graceful_shutdown(
            vec![("http", listener), ("consumer", consumer_task)],
            Some(settings.server.shutdown_timeout()),
        )
        .await;

    if stragglers.is_empty() {
        tracing::info!("shutdown complete");
    } else {
        tracing::warn!(?stragglers, "shutdown deadline passed with tasks still running");
    }
    Ok(())
}
