//! Local etcd image override

use trellis_common::templates::{KubeadmControlPlaneTemplate, LocalEtcd};
use trellis_common::variables::{Etcd, CLUSTER_CONFIG_VARIABLE_NAME};

use super::control_plane;
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.etcd`
pub const ETCD: VariableRef = VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["etcd"]);

/// Local etcd image on the control plane
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![Box::new(TypedMutator::new(
        "etcd-image",
        ETCD,
        control_plane(TemplateKind::KubeadmControlPlaneTemplate),
        |etcd: &Etcd, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
            let Some(image) = &etcd.image else {
                return Ok(());
            };
            if image.repository.is_none() && image.tag.is_none() {
                return Ok(());
            }

            let local = kcpt
                .spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut()
                .etcd
                .get_or_insert_with(Default::default)
                .local
                .get_or_insert_with(LocalEtcd::default);
            if let Some(repository) = &image.repository {
                local.image_repository = Some(repository.clone());
            }
            if let Some(tag) = &image.tag {
                local.image_tag = Some(tag.clone());
            }
            Ok(())
        },
    ))]
}
