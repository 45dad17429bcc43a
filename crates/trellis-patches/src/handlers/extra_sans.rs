//! Extra API server certificate SANs

use trellis_common::templates::KubeadmControlPlaneTemplate;
use trellis_common::variables::CLUSTER_CONFIG_VARIABLE_NAME;

use super::control_plane;
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.extraAPIServerCertSANs`
pub const EXTRA_API_SERVER_CERT_SANS: VariableRef =
    VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["extraAPIServerCertSANs"]);

/// Extra API server certificate SANs on the control plane
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![Box::new(TypedMutator::new(
        "extra-apiserver-cert-sans",
        EXTRA_API_SERVER_CERT_SANS,
        control_plane(TemplateKind::KubeadmControlPlaneTemplate),
        |sans: &Vec<String>, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
            if sans.is_empty() {
                return Ok(());
            }
            let api_server = kcpt
                .spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut()
                .api_server
                .get_or_insert_with(Default::default);
            // Existing SANs keep their position so the diff is append-only
            for san in sans {
                if !api_server.cert_sans.contains(san) {
                    api_server.cert_sans.push(san.clone());
                }
            }
            Ok(())
        },
    ))]
}
