//! Provider-independent cluster configuration
//!
//! Every provider's `clusterConfig` flattens [`GenericClusterConfig`], so the
//! generic mutators find these fields at the same path for every provider.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster configuration shared by all infrastructure providers
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenericClusterConfig {
    /// Registry to pull Kubernetes control plane images from
    /// (e.g., "registry.example.com/k8s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_image_repository: Option<String>,

    /// etcd configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<Etcd>,

    /// Extra Subject Alternative Names for the API server signing certificate
    #[serde(
        default,
        rename = "extraAPIServerCertSANs",
        skip_serializing_if = "Option::is_none"
    )]
    pub extra_api_server_cert_sans: Option<Vec<String>>,

    /// HTTP proxy used by containerd on every node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<HttpProxy>,

    /// Registry mirror used for all image pulls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_image_registry_mirror: Option<GlobalImageRegistryMirror>,

    /// Users to create on every node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
}

/// etcd configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Etcd {
    /// etcd image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}

/// Container image reference split into repository and tag
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image repository (e.g., "registry.k8s.io")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Image tag (e.g., "v3.5.9")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// HTTP proxy configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxy {
    /// Proxy for plain HTTP traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,

    /// Proxy for HTTPS traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,

    /// Destinations that bypass the proxy, in addition to the cluster-internal defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_no: Vec<String>,
}

/// Registry mirror for all image pulls
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalImageRegistryMirror {
    /// Mirror URL (e.g., "https://mirror.example.com")
    pub url: String,
}

/// Node user account
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Login name
    pub name: String,

    /// Password hash in crypt(3) format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_password: Option<String>,

    /// SSH public keys authorized for this user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,

    /// sudoers rule (e.g., "ALL=(ALL) NOPASSWD:ALL")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sudo: Option<String>,
}
