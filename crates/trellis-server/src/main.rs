//! Trellis - Cluster API runtime extension for ClusterClass topologies

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use trellis_common::telemetry::{init_telemetry, TelemetryConfig};
use trellis_patches::{handlers, ObjectRegistry};
use trellis_server::lifecycle::{KubeClusterClient, RegistryMirrorDefaults};
use trellis_server::{router, server, AppState, Config, HandlerRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider before anything opens a TLS connection
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install crypto provider: {:?}. \
             The extension cannot serve TLS without it.",
            e
        );
        std::process::exit(1);
    }

    let config = Config::parse();

    init_telemetry(TelemetryConfig {
        service_name: "trellis".to_string(),
        format: config.log_format,
    })?;

    config.validate()?;
    let listener = config.listener()?;

    let mut registry =
        HandlerRegistry::new(config.timeout_seconds, config.failure_policy.into());

    let objects = Arc::new(ObjectRegistry::with_all_kinds());
    for handler in handlers::all(objects)? {
        registry.register_patches(handler)?;
    }

    if let Some(mirror) = &config.default_registry_mirror {
        let client = kube::Client::try_default().await?;
        registry.register_lifecycle(Arc::new(RegistryMirrorDefaults::new(
            mirror.clone(),
            Arc::new(KubeClusterClient::new(client)),
            config.retry_after_seconds,
        )))?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        timeout_secs = config.timeout_seconds,
        "trellis starting"
    );

    let app = router(Arc::new(AppState {
        registry,
        timeout: config.timeout(),
    }));
    server::serve(listener, config.bind_address, app).await?;

    Ok(())
}
