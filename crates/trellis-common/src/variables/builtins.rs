//! The synthetic `builtin` variable
//!
//! CAPI computes this per request item. Only the fields the mutators and the
//! selector matcher read are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Value of the `builtin` variable
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Builtins {
    /// Cluster context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterBuiltins>,
    /// Control plane context (control plane items only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<ControlPlaneBuiltins>,
    /// Machine deployment context (machine deployment items only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_deployment: Option<MachineDeploymentBuiltins>,
}

/// `builtin.cluster`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBuiltins {
    /// Cluster name
    #[serde(default)]
    pub name: String,
    /// Cluster namespace
    #[serde(default)]
    pub namespace: String,
    /// Topology context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<ClusterTopologyBuiltins>,
}

/// `builtin.cluster.topology`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTopologyBuiltins {
    /// Desired Kubernetes version
    #[serde(default)]
    pub version: String,
    /// ClusterClass name
    #[serde(default)]
    pub class: String,
}

/// `builtin.controlPlane`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneBuiltins {
    /// Control plane Kubernetes version
    #[serde(default)]
    pub version: String,
    /// Control plane object name
    #[serde(default)]
    pub name: String,
    /// Desired replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
}

/// `builtin.machineDeployment`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentBuiltins {
    /// Machine deployment Kubernetes version
    #[serde(default)]
    pub version: String,
    /// Machine deployment class name
    #[serde(default)]
    pub class: String,
    /// Machine deployment object name
    #[serde(default)]
    pub name: String,
    /// Name of the machine deployment in the Cluster topology
    #[serde(default)]
    pub topology_name: String,
    /// Desired replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
}
