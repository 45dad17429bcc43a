//! HTTP proxy for containerd
//!
//! Writes a systemd drop-in setting the proxy environment for containerd and
//! restarts it before kubeadm runs, on control plane and worker nodes alike.

use std::fmt::Write as _;

use trellis_common::templates::{
    File, KubeadmConfigSpec, KubeadmConfigTemplate, KubeadmControlPlaneTemplate,
};
use trellis_common::variables::{HttpProxy, CLUSTER_CONFIG_VARIABLE_NAME};

use super::{all_workers, control_plane};
use crate::handler::{Mutate, TypedMutator};
use crate::objects::TemplateKind;
use crate::variables::VariableRef;

/// `clusterConfig.proxy`
pub const PROXY: VariableRef = VariableRef::new(CLUSTER_CONFIG_VARIABLE_NAME, &["proxy"]);

/// systemd drop-in read by containerd.service
pub const CONTAINERD_PROXY_DROP_IN: &str = "/etc/systemd/system/containerd.service.d/http-proxy.conf";

/// Command applying the drop-in
pub const RESTART_CONTAINERD: &str = "systemctl daemon-reload && systemctl restart containerd";

/// Destinations that always bypass the proxy
const DEFAULT_NO_PROXY: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "kubernetes",
    "kubernetes.default",
    ".svc",
    ".svc.cluster.local",
];

/// Containerd HTTP proxy drop-in on the control plane and on every worker pool
pub fn mutators() -> Vec<Box<dyn Mutate>> {
    vec![
        Box::new(TypedMutator::new(
            "http-proxy-control-plane",
            PROXY,
            control_plane(TemplateKind::KubeadmControlPlaneTemplate),
            |proxy: &HttpProxy, kcpt: &mut KubeadmControlPlaneTemplate, _ctx| {
                configure(proxy, &mut kcpt.spec.template.spec.kubeadm_config_spec);
                Ok(())
            },
        )),
        Box::new(TypedMutator::new(
            "http-proxy-workers",
            PROXY,
            all_workers(TemplateKind::KubeadmConfigTemplate),
            |proxy: &HttpProxy, kct: &mut KubeadmConfigTemplate, _ctx| {
                configure(proxy, &mut kct.spec.template.spec);
                Ok(())
            },
        )),
    ]
}

fn configure(proxy: &HttpProxy, spec: &mut KubeadmConfigSpec) {
    let Some(content) = drop_in(proxy) else {
        return;
    };
    spec.upsert_file(File {
        path: CONTAINERD_PROXY_DROP_IN.to_string(),
        owner: Some("root:root".to_string()),
        permissions: Some("0640".to_string()),
        content: Some(content),
    });
    spec.ensure_pre_kubeadm_command(RESTART_CONTAINERD);
}

/// Render the drop-in, or `None` when no proxy is configured
fn drop_in(proxy: &HttpProxy) -> Option<String> {
    if proxy.http.is_none() && proxy.https.is_none() {
        return None;
    }

    let mut content = String::from("[Service]\n");
    let mut env = |name: &str, value: &str| {
        let _ = writeln!(content, "Environment=\"{}={}\"", name.to_uppercase(), value);
        let _ = writeln!(content, "Environment=\"{}={}\"", name.to_lowercase(), value);
    };
    if let Some(http) = &proxy.http {
        env("http_proxy", http);
    }
    if let Some(https) = &proxy.https {
        env("https_proxy", https);
    }
    env("no_proxy", &no_proxy(proxy).join(","));
    Some(content)
}

fn no_proxy(proxy: &HttpProxy) -> Vec<String> {
    let mut hosts: Vec<String> = DEFAULT_NO_PROXY.iter().map(|h| h.to_string()).collect();
    for host in &proxy.additional_no {
        if !hosts.contains(host) {
            hosts.push(host.clone());
        }
    }
    hosts
}
