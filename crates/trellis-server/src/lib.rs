//! Trellis Runtime Extension Server
//!
//! Serves the Cluster API Runtime Hooks protocol over HTTPS. Topology
//! mutation hooks are answered by the meta handlers from `trellis-patches`;
//! lifecycle hooks by the handlers in [`lifecycle`].
//!
//! # Endpoints
//!
//! - `POST /hooks.runtime.cluster.x-k8s.io/v1alpha1/discovery` - Handlers and hooks served
//! - `POST /hooks.runtime.cluster.x-k8s.io/v1alpha1/{hook}/{handler}` - Hook calls
//! - `GET /healthz` - Health check
//! - `GET /readyz` - Readiness check

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod routes;
pub mod server;

pub use config::{Config, Listener};
pub use error::{Error, Result};
pub use registry::HandlerRegistry;
pub use routes::{router, AppState};
