//! Common types for Trellis: errors, runtime hook wire types, variables, and templates

#![deny(missing_docs)]

pub mod error;
pub mod hooks;
pub mod schema;
pub mod telemetry;
pub mod templates;
pub mod variables;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime Hooks API group and version served by this extension
pub const RUNTIME_HOOKS_API_VERSION: &str = "hooks.runtime.cluster.x-k8s.io/v1alpha1";

/// Default port for the runtime extension HTTPS server
///
/// CAPI's ExtensionConfig points at a Service; 9443 is the conventional
/// webhook port and avoids requiring root privileges.
pub const DEFAULT_SERVER_PORT: u16 = 9443;

/// Default per-call timeout advertised to CAPI in discovery
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 10;
