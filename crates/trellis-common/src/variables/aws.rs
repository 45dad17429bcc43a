//! AWS (CAPA) cluster and worker configuration
//!
//! Reference: <https://github.com/kubernetes-sigs/cluster-api-provider-aws>

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::generic::GenericClusterConfig;

/// `clusterConfig` for AWS clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsClusterConfig {
    /// Provider-independent settings
    #[serde(flatten)]
    pub generic: GenericClusterConfig,

    /// Cluster-wide AWS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpec>,

    /// Control plane machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<AwsControlPlaneSpec>,
}

/// Cluster-wide AWS settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsSpec {
    /// AWS region (e.g., "us-west-2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Control plane settings for AWS clusters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsControlPlaneSpec {
    /// EC2 machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeSpec>,
}

/// `workerConfig` for AWS machine deployments
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsWorkerConfig {
    /// EC2 machine settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeSpec>,
}

/// EC2 machine settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsNodeSpec {
    /// EC2 instance type (e.g., "m5.xlarge")
    pub instance_type: String,
}
