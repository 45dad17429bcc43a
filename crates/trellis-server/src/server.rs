//! Listener setup and graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::info;

use crate::config::Listener;
use crate::error::{Error, Result};

/// How long in-flight hook calls get to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serve `app` on `addr` until ctrl-c or SIGTERM
pub async fn serve(listener: Listener, addr: SocketAddr, app: Router) -> Result<()> {
    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match listener {
        Listener::Https { cert, key } => {
            let tls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .map_err(|e| Error::Config(format!("TLS config error: {}", e)))?;

            info!(addr = %addr, cert = %cert.display(), "starting runtime extension (https)");

            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;
        }
        Listener::Http => {
            info!(addr = %addr, "starting runtime extension (plain http)");

            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;
        }
    }

    info!("runtime extension stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    wait_for_signal().await;
    info!("shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
