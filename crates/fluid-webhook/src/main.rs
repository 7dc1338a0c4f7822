//! Fluid scheduling webhook binary

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing::info;

use fluid_common::telemetry::{init_telemetry, TelemetryConfig};
use fluid_scheduling::{Injector, KubeObjectStore};
use fluid_webhook::{start_server, Cli, ServerConfig, WebhookState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // axum-server's rustls listener needs a process-wide provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        service_name: "fluid-webhook".to_string(),
        format: cli.log_format,
    })?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let store = KubeObjectStore::new(client)
        .with_policy_location(cli.policy_namespace.clone(), cli.policy_name.clone());
    let injector = Injector::new(Arc::new(store));
    let state = Arc::new(WebhookState::new(injector, cli.failure_policy));

    info!(
        policy = %format!("{}/{}", cli.policy_namespace, cli.policy_name),
        failure_policy = ?cli.failure_policy,
        "Starting fluid scheduling webhook"
    );

    start_server(
        ServerConfig {
            addr: cli.listen_addr,
            tls: cli.tls(),
        },
        state,
    )
    .await?;

    Ok(())
}
