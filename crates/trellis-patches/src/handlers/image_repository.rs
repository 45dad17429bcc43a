//! Kubernetes image repository
//!
//! Points kubeadm at a registry other than `registry.k8s.io` for the control
//! plane images.

use trellis_common::templates::KubeadmControlPlaneTemplate;
use trellis_common::variables::CLUSTER_CONFIG_VARIABLE_NAME;

use super::control_plane;
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.kubernetesImageRepository`
pub const IMAGE_REPOSITORY: VariableRef =
    VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["kubernetesImageRepository"]);

/// Kubernetes image repository on the control plane
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![Box::new(TypedMutator::new(
        "kubernetes-image-repository",
        IMAGE_REPOSITORY,
        control_plane(TemplateKind::KubeadmControlPlaneTemplate),
        |repository: &String, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
            kcpt.spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut()
                .image_repository = Some(repository.clone());
            Ok(())
        },
    ))]
}
