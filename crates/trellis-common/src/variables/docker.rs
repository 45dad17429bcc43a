//! Docker (CAPD) cluster and worker configuration

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::generic::GenericClusterConfig;

/// `clusterConfig` for Docker clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterConfig {
    /// Provider-independent settings
    #[serde(flatten)]
    pub generic: GenericClusterConfig,

    /// Control plane machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<DockerControlPlaneSpec>,
}

/// Control plane settings for Docker clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerControlPlaneSpec {
    /// Docker machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerNodeSpec>,
}

/// `workerConfig` for Docker machine deployments
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerWorkerConfig {
    /// Docker machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerNodeSpec>,
}

/// Docker machine settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerNodeSpec {
    /// Node image; defaults to the kind node image for the topology version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,
}
