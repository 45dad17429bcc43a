//! Global image registry mirror
//!
//! Configures containerd to pull every registry through one mirror by writing
//! a `_default` hosts.toml and enabling containerd's `config_path`.

use trellis_common::templates::{
    File, KubeadmConfigSpec, KubeadmConfigTemplate, KubeadmControlPlaneTemplate,
};
use trellis_common::variables::{GlobalImageRegistryMirror, CLUSTER_CONFIG_VARIABLE_NAME};
use trellis_common::{Error, Result};

use super::{all_workers, control_plane};
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.globalImageRegistryMirror`
pub const GLOBAL_IMAGE_REGISTRY_MIRROR: VariableRef =
    VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["globalImageRegistryMirror"]);

/// hosts.toml applied to registries without their own entry
pub const DEFAULT_HOSTS_TOML: &str = "/etc/containerd/certs.d/_default/hosts.toml";

/// Enables containerd's per-registry config directory
pub const ENABLE_CONFIG_PATH: &str = r#"sed -i 's|config_path = ""|config_path = "/etc/containerd/certs.d"|' /etc/containerd/config.toml && systemctl restart containerd"#;

const HANDLER: &str = "global-image-registry-mirror";

/// Containerd registry mirror on the control plane and on every worker pool
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![
        Box::new(TypedMutator::new(
            HANDLER,
            GLOBAL_IMAGE_REGISTRY_MIRROR,
            control_plane(TemplateKind::KubeadmControlPlaneTemplate),
            |mirror: &GlobalImageRegistryMirror, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
                configure(mirror, &mut kcpt.spec.template.spec.kubeadm_config_spec)
            },
        )),
        Box::new(TypedMutator::new(
            format!("{HANDLER}-workers"),
            GLOBAL_IMAGE_REGISTRY_MIRROR,
            all_workers(TemplateKind::KubeadmConfigTemplate),
            |mirror: &GlobalImageRegistryMirror, kct: &mut KubeadmConfigTemplate, _ctx| {
                configure(mirror, &mut kct.spec.template.spec)
            },
        )),
    ]
}

fn configure(mirror: &GlobalImageRegistryMirror, spec: &mut KubeadmConfigSpec) -> Result<()> {
    let url = mirror.url.trim();
    if url.is_empty() {
        return Err(Error::mutation(HANDLER, "globalImageRegistryMirror.url must not be empty"));
    }

    spec.upsert_file(File {
        path: DEFAULT_HOSTS_TOML.to_string(),
        owner: Some("root:root".to_string()),
        permissions: Some("0644".to_string()),
        content: Some(hosts_toml(url)),
    });
    spec.ensure_pre_kubeadm_command(ENABLE_CONFIG_PATH);
    Ok(())
}

fn hosts_toml(url: &str) -> String {
    let host = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    format!("[host.\"{host}\"]\n  capabilities = [\"pull\", \"resolve\"]\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_common::hooks::ClusterVariable;

    use crate::handlers::test_support::{
        control_plane_item, kubeadm_config_template, kubeadm_control_plane_template, patched, run,
        worker_bootstrap_item,
    };

    fn vars(url: &str) -> [ClusterVariable; 1] {
        [ClusterVariable::new(
            "clusterConfig",
            json!({"globalImageRegistryMirror": {"url": url}}),
        )]
    }

    #[test]
    fn writes_default_hosts_toml_on_workers() {
        let worker = patched(
            &mutators(),
            &vars("mirror.example.com:5000"),
            &worker_bootstrap_item("md", kubeadm_config_template(), "default-worker"),
        );

        let spec = &worker["spec"]["template"]["spec"];
        assert_eq!(
            spec["files"],
            json!([{
                "path": DEFAULT_HOSTS_TOML,
                "owner": "root:root",
                "permissions": "0644",
                "content": "[host.\"https://mirror.example.com:5000\"]\n  capabilities = [\"pull\", \"resolve\"]\n"
            }])
        );
        assert_eq!(spec["preKubeadmCommands"], json!([ENABLE_CONFIG_PATH]));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(
            hosts_toml("http://mirror.local"),
            "[host.\"http://mirror.local\"]\n  capabilities = [\"pull\", \"resolve\"]\n"
        );
    }

    #[test]
    fn empty_url_fails_the_mutation() {
        let item = control_plane_item("cp", kubeadm_control_plane_template());
        let err = run(&mutators(), &vars("  "), &item).unwrap_err();
        assert!(matches!(err, Error::Mutation { .. }));
    }
}
