//! Feature mutators and the meta handlers grouping them
//!
//! Generic mutators read fields of the provider-independent cluster config and
//! patch kubeadm templates, so they are shared by every provider's handler.
//! Provider mutators patch the provider's infrastructure templates.

pub mod aws;
pub mod docker;
pub mod etcd;
pub mod extra_sans;
pub mod http_proxy;
pub mod image_repository;
pub mod registry_mirror;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use trellis_common::hooks::{MachineDeploymentClassSelector, PatchSelector, PatchSelectorMatch};
use trellis_common::variables::{
    AwsClusterConfig, AwsWorkerConfig, DockerClusterConfig, DockerWorkerConfig,
    CLUSTER_CONFIG_VARIABLE_NAME, WORKER_CONFIG_VARIABLE_NAME,
};
use trellis_common::Result;

use crate::handler::{MetaHandler, Mutate, VariableDefinition};
use crate::objects::{ObjectRegistry, TemplateKind};

/// Meta handler name for Docker clusters
pub const DOCKER_CLUSTER_CONFIG_HANDLER: &str = "docker-cluster-config";
/// Meta handler name for AWS clusters
pub const AWS_CLUSTER_CONFIG_HANDLER: &str = "aws-cluster-config";

/// Build every meta handler this binary serves
pub fn all(registry: Arc<ObjectRegistry>) -> Result<Vec<MetaHandler>> {
    Ok(vec![
        docker_cluster_config(registry.clone())?,
        aws_cluster_config(registry)?,
    ])
}

/// Meta handler for clusters on CAPD
pub fn docker_cluster_config(registry: Arc<ObjectRegistry>) -> Result<MetaHandler> {
    MetaHandler::builder(DOCKER_CLUSTER_CONFIG_HANDLER)
        .variable(VariableDefinition::of::<DockerClusterConfig>(
            CLUSTER_CONFIG_VARIABLE_NAME,
            true,
        )?)
        .variable(VariableDefinition::of::<DockerWorkerConfig>(
            WORKER_CONFIG_VARIABLE_NAME,
            false,
        )?)
        .mutators(generic_mutators())
        .mutators(docker::mutators())
        .build(registry)
}

/// Meta handler for clusters on CAPA
pub fn aws_cluster_config(registry: Arc<ObjectRegistry>) -> Result<MetaHandler> {
    MetaHandler::builder(AWS_CLUSTER_CONFIG_HANDLER)
        .variable(VariableDefinition::of::<AwsClusterConfig>(
            CLUSTER_CONFIG_VARIABLE_NAME,
            true,
        )?)
        .variable(VariableDefinition::of::<AwsWorkerConfig>(
            WORKER_CONFIG_VARIABLE_NAME,
            false,
        )?)
        .mutators(generic_mutators())
        .mutators(aws::mutators())
        .build(registry)
}

/// Mutators for the provider-independent part of `clusterConfig`
pub fn generic_mutators() -> Vec<Box<dyn Mutate>> {
    [
        image_repository::mutators(),
        etcd::mutators(),
        extra_sans::mutators(),
        http_proxy::mutators(),
        registry_mirror::mutators(),
        users::mutators(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// =============================================================================
// Selectors
// =============================================================================

fn selector(kind: TemplateKind, match_resources: PatchSelectorMatch) -> PatchSelector {
    PatchSelector {
        api_version: kind.api_version().to_string(),
        kind: kind.kind_str().to_string(),
        match_resources,
    }
}

/// Objects of `kind` in the control plane position
pub(crate) fn control_plane(kind: TemplateKind) -> PatchSelector {
    selector(
        kind,
        PatchSelectorMatch {
            control_plane: true,
            ..Default::default()
        },
    )
}

/// Objects of `kind` referenced by the Cluster as its infrastructure cluster
pub(crate) fn infrastructure_cluster(kind: TemplateKind) -> PatchSelector {
    selector(
        kind,
        PatchSelectorMatch {
            infrastructure_cluster: true,
            ..Default::default()
        },
    )
}

/// Objects of `kind` referenced by any machine deployment
pub(crate) fn all_workers(kind: TemplateKind) -> PatchSelector {
    selector(
        kind,
        PatchSelectorMatch {
            machine_deployment_class: Some(MachineDeploymentClassSelector {
                names: vec!["*".to_string()],
            }),
            ..Default::default()
        },
    )
}
