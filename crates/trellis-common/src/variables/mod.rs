//! ClusterClass variable value types
//!
//! These are the typed shapes of the variables this extension defines. Each
//! type derives `JsonSchema`, and its schema is what DiscoverVariables
//! advertises; the same type is what GeneratePatches decodes.
//!
//! Field names are the camelCase JSON names used in Cluster topologies, e.g.
//! `clusterConfig.etcd.image.tag`. Names and paths are case-sensitive.

mod aws;
mod builtins;
mod docker;
mod generic;

pub use aws::{AwsClusterConfig, AwsControlPlaneSpec, AwsNodeSpec, AwsSpec, AwsWorkerConfig};
pub use builtins::{
    Builtins, ClusterBuiltins, ClusterTopologyBuiltins, ControlPlaneBuiltins,
    MachineDeploymentBuiltins,
};
pub use docker::{DockerClusterConfig, DockerControlPlaneSpec, DockerNodeSpec, DockerWorkerConfig};
pub use generic::{
    Etcd, GenericClusterConfig, GlobalImageRegistryMirror, HttpProxy, Image, User,
};

/// Cluster-wide configuration variable (required)
pub const CLUSTER_CONFIG_VARIABLE_NAME: &str = "clusterConfig";

/// Per machine-deployment configuration variable (optional)
pub const WORKER_CONFIG_VARIABLE_NAME: &str = "workerConfig";

/// Synthetic variable CAPI injects with computed topology context
pub const BUILTINS_VARIABLE_NAME: &str = "builtin";
