//! CAPD (Docker) infrastructure templates

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// `infrastructure.cluster.x-k8s.io` DockerMachineTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineTemplate {
    /// API version
    pub api_version: String,
    /// Always "DockerMachineTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: DockerMachineTemplateSpec,
}

/// DockerMachineTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: DockerMachineTemplateResource,
}

/// DockerMachineTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineTemplateResource {
    /// Machine spec
    #[serde(default)]
    pub spec: DockerMachineSpec,
}

/// DockerMachine spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerMachineSpec {
    /// Node image (e.g., "kindest/node:v1.32.0")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_image: Option<String>,

    /// Images loaded into the node container before kubeadm runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_load_images: Option<Vec<String>>,
}

/// `infrastructure.cluster.x-k8s.io` DockerClusterTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterTemplate {
    /// API version
    pub api_version: String,
    /// Always "DockerClusterTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: DockerClusterTemplateSpec,
}

/// DockerClusterTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: DockerClusterTemplateResource,
}

/// DockerClusterTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterTemplateResource {
    /// Cluster spec
    #[serde(default)]
    pub spec: DockerClusterSpec,
}

/// DockerCluster spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerClusterSpec {
    /// haproxy load balancer in front of the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<DockerLoadBalancer>,
}

/// DockerCluster load balancer settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerLoadBalancer {
    /// Load balancer image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,

    /// Load balancer image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
}
