//! Kubeadm bootstrap and control plane templates

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

// =============================================================================
// KubeadmControlPlaneTemplate
// =============================================================================

/// `controlplane.cluster.x-k8s.io` KubeadmControlPlaneTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplate {
    /// API version
    pub api_version: String,
    /// Always "KubeadmControlPlaneTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: KubeadmControlPlaneTemplateSpec,
}

/// KubeadmControlPlaneTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: KubeadmControlPlaneTemplateResource,
}

/// KubeadmControlPlaneTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplateResource {
    /// Control plane spec
    #[serde(default)]
    pub spec: KubeadmControlPlaneTemplateResourceSpec,
}

/// KubeadmControlPlaneTemplate `.spec.template.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmControlPlaneTemplateResourceSpec {
    /// Kubeadm configuration for control plane machines
    #[serde(default)]
    pub kubeadm_config_spec: KubeadmConfigSpec,
}

// =============================================================================
// KubeadmConfigTemplate
// =============================================================================

/// `bootstrap.cluster.x-k8s.io` KubeadmConfigTemplate
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigTemplate {
    /// API version
    pub api_version: String,
    /// Always "KubeadmConfigTemplate"
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Template spec
    #[serde(default)]
    pub spec: KubeadmConfigTemplateSpec,
}

/// KubeadmConfigTemplate `.spec`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigTemplateSpec {
    /// Template resource
    #[serde(default)]
    pub template: KubeadmConfigTemplateResource,
}

/// KubeadmConfigTemplate `.spec.template`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigTemplateResource {
    /// Kubeadm configuration for worker machines
    #[serde(default)]
    pub spec: KubeadmConfigSpec,
}

// =============================================================================
// Shared kubeadm configuration
// =============================================================================

/// KubeadmConfigSpec, shared by control plane and worker templates
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmConfigSpec {
    /// kubeadm ClusterConfiguration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_configuration: Option<ClusterConfiguration>,

    /// Files written to the node before kubeadm runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// Shell commands run before kubeadm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_kubeadm_commands: Vec<String>,

    /// Shell commands run after kubeadm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_kubeadm_commands: Vec<String>,

    /// Node users
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<KubeadmUser>,
}

impl KubeadmConfigSpec {
    /// Get the ClusterConfiguration, creating an empty one if absent
    pub fn cluster_configuration_mut(&mut self) -> &mut ClusterConfiguration {
        self.cluster_configuration.get_or_insert_with(Default::default)
    }

    /// Insert a file, replacing any existing file at the same path
    pub fn upsert_file(&mut self, file: File) {
        match self.files.iter_mut().find(|f| f.path == file.path) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    /// Append a pre-kubeadm command unless it is already present
    pub fn ensure_pre_kubeadm_command(&mut self, command: impl Into<String>) {
        let command = command.into();
        if !self.pre_kubeadm_commands.contains(&command) {
            self.pre_kubeadm_commands.push(command);
        }
    }
}

/// kubeadm ClusterConfiguration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    /// Registry for control plane images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,

    /// etcd settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<EtcdConfiguration>,

    /// API server settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server: Option<ApiServer>,
}

/// kubeadm etcd settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdConfiguration {
    /// Stacked etcd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalEtcd>,
}

/// Stacked etcd settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalEtcd {
    /// etcd image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_repository: Option<String>,

    /// etcd image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// Extra etcd flags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
}

/// kubeadm API server settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiServer {
    /// Extra Subject Alternative Names for the serving certificate
    #[serde(default, rename = "certSANs", skip_serializing_if = "Vec::is_empty")]
    pub cert_sans: Vec<String>,

    /// Extra kube-apiserver flags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
}

/// File written by cloud-init/ignition
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    pub path: String,

    /// File owner (e.g., "root:root")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Octal permissions (e.g., "0644")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,

    /// File content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Node user created by the bootstrap provider
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmUser {
    /// Login name
    pub name: String,

    /// Password hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwd: Option<String>,

    /// Disable password login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_password: Option<bool>,

    /// SSH public keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,

    /// sudoers rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sudo: Option<String>,
}
