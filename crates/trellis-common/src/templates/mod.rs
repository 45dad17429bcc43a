//! Typed CAPI template objects
//!
//! Only the fields the feature mutators read or write are modelled. Nested
//! blocks are `Option` and skipped when unset so a decoded object serializes
//! back to the same shape it was received in; JSON Patches computed against
//! these types therefore address paths that exist in the original object.

mod aws;
mod docker;
mod kubeadm;

pub use aws::{
    AwsClusterTemplate, AwsClusterTemplateResource, AwsClusterTemplateSpec, AwsClusterSpec,
    AwsMachineSpec, AwsMachineTemplate, AwsMachineTemplateResource, AwsMachineTemplateSpec,
};
pub use docker::{
    DockerClusterSpec, DockerClusterTemplate, DockerClusterTemplateResource,
    DockerClusterTemplateSpec, DockerLoadBalancer, DockerMachineSpec, DockerMachineTemplate,
    DockerMachineTemplateResource, DockerMachineTemplateSpec,
};
pub use kubeadm::{
    ApiServer, ClusterConfiguration, EtcdConfiguration, File, KubeadmConfigSpec,
    KubeadmConfigTemplate, KubeadmConfigTemplateResource, KubeadmConfigTemplateSpec,
    KubeadmControlPlaneTemplate, KubeadmControlPlaneTemplateResource,
    KubeadmControlPlaneTemplateResourceSpec, KubeadmControlPlaneTemplateSpec, KubeadmUser,
    LocalEtcd,
};

/// CAPI core API version
pub const CAPI_CLUSTER_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";
/// Kubeadm bootstrap provider API version (KubeadmConfigTemplate)
pub const CAPI_BOOTSTRAP_API_VERSION: &str = "bootstrap.cluster.x-k8s.io/v1beta1";
/// Kubeadm control plane provider API version (KubeadmControlPlaneTemplate)
pub const CAPI_CONTROLPLANE_API_VERSION: &str = "controlplane.cluster.x-k8s.io/v1beta1";
/// CAPD (Docker) infrastructure API version
pub const DOCKER_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";
/// CAPA (AWS) infrastructure API version
pub const AWS_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta2";
