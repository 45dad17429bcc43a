//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use trellis_common::hooks::FailurePolicy;
use trellis_common::telemetry::LogFormat;
use trellis_common::{DEFAULT_SERVER_PORT, DEFAULT_TIMEOUT_SECONDS};

use crate::error::{Error, Result};

/// Trellis - Cluster API runtime extension for ClusterClass topologies
#[derive(Parser, Debug, Clone)]
#[command(name = "trellis", version, about, long_about = None)]
pub struct Config {
    /// Address the extension listens on
    #[arg(long, env = "TRELLIS_BIND_ADDRESS", default_value_t = default_bind_address())]
    pub bind_address: SocketAddr,

    /// PEM certificate served to CAPI
    #[arg(long, env = "TRELLIS_TLS_CERT_FILE")]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key for the certificate
    #[arg(long, env = "TRELLIS_TLS_KEY_FILE")]
    pub tls_key_file: Option<PathBuf>,

    /// Serve plain HTTP (local development only)
    #[arg(long, env = "TRELLIS_INSECURE_HTTP")]
    pub insecure_http: bool,

    /// Per-call timeout advertised in discovery and enforced by the server
    #[arg(long, env = "TRELLIS_TIMEOUT_SECONDS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u32,

    /// What CAPI does when a handler fails or is unreachable
    #[arg(
        long,
        env = "TRELLIS_FAILURE_POLICY",
        value_enum,
        default_value_t = FailurePolicyArg::Fail
    )]
    pub failure_policy: FailurePolicyArg,

    /// Registry mirror written into new Clusters that do not configure one
    #[arg(long, env = "TRELLIS_DEFAULT_REGISTRY_MIRROR")]
    pub default_registry_mirror: Option<String>,

    /// Seconds CAPI waits before retrying a failed blocking lifecycle hook
    #[arg(long, env = "TRELLIS_RETRY_AFTER_SECONDS", default_value_t = 10)]
    pub retry_after_seconds: i32,

    /// Log format (json or text)
    #[arg(long, env = "TRELLIS_LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

/// Largest per-call timeout CAPI accepts in a discovery response
pub const MAX_TIMEOUT_SECONDS: u32 = 30;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVER_PORT))
}

/// Failure policy flag values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicyArg {
    /// Fail the reconcile
    Fail,
    /// Ignore the failure
    Ignore,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Fail => FailurePolicy::Fail,
            FailurePolicyArg::Ignore => FailurePolicy::Ignore,
        }
    }
}

/// Where the server gets its TLS material
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listener {
    /// Plain HTTP
    Http,
    /// HTTPS with the given PEM files
    Https {
        /// Certificate chain
        cert: PathBuf,
        /// Private key
        key: PathBuf,
    },
}

impl Config {
    /// Check flag combinations clap cannot express
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(Error::Config(format!(
                "timeout-seconds must be between 1 and {MAX_TIMEOUT_SECONDS}, got {}",
                self.timeout_seconds
            )));
        }
        if self.retry_after_seconds <= 0 {
            return Err(Error::Config("retry-after-seconds must be greater than 0".into()));
        }
        if let Some(mirror) = &self.default_registry_mirror {
            if mirror.trim().is_empty() {
                return Err(Error::Config("default-registry-mirror must not be empty".into()));
            }
        }
        self.listener().map(|_| ())
    }

    /// Resolve the listener; TLS is required unless plain HTTP is requested
    pub fn listener(&self) -> Result<Listener> {
        if self.insecure_http {
            return Ok(Listener::Http);
        }
        match (&self.tls_cert_file, &self.tls_key_file) {
            (Some(cert), Some(key)) => Ok(Listener::Https {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => Err(Error::Config(
                "tls-cert-file and tls-key-file are required unless insecure-http is set".into(),
            )),
        }
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }
}
