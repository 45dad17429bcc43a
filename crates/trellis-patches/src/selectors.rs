//! Resource selector matching
//!
//! Decides whether a templated object is in scope for a patch, based on its
//! apiVersion/kind and on where it sits in the Cluster's object graph as
//! described by its [`HolderReference`].

use serde_json::Value;
use tracing::debug;

use trellis_common::hooks::{HolderReference, PatchSelector};
use trellis_common::variables::BUILTINS_VARIABLE_NAME;

use crate::variables::{get, VariableMap};

/// Holder field path of the infrastructure cluster reference on a Cluster
pub const INFRASTRUCTURE_REF_FIELD_PATH: &str = "spec.infrastructureRef";
/// Holder field path of the control plane reference on a Cluster
pub const CONTROL_PLANE_REF_FIELD_PATH: &str = "spec.controlPlaneRef";
/// Holder field path of the machine template referenced by a control plane
pub const CONTROL_PLANE_MACHINE_TEMPLATE_FIELD_PATH: &str = "spec.machineTemplate.infrastructureRef";
/// Holder field path of a machine deployment's infrastructure template
pub const MACHINE_DEPLOYMENT_INFRASTRUCTURE_FIELD_PATH: &str = "spec.template.spec.infrastructureRef";
/// Holder field path of a machine deployment's bootstrap template
pub const MACHINE_DEPLOYMENT_BOOTSTRAP_FIELD_PATH: &str = "spec.template.spec.bootstrap.configRef";

const CLUSTER_KIND: &str = "Cluster";
const MACHINE_DEPLOYMENT_KIND: &str = "MachineDeployment";

/// Check whether `selector` applies to `object` held at `holder`
///
/// The object's apiVersion and kind must equal the selector's. After that the
/// object matches when any configured structural position matches; a selector
/// with no position configured matches nothing.
pub fn matches(
    selector: &PatchSelector,
    object: &Value,
    holder: &HolderReference,
    variables: &VariableMap,
) -> bool {
    if !gvk_matches(selector, object) {
        return false;
    }

    let resources = &selector.match_resources;
    if !resources.infrastructure_cluster
        && !resources.control_plane
        && resources.machine_deployment_class.is_none()
    {
        debug!(
            api_version = %selector.api_version,
            kind = %selector.kind,
            "selector has no matchResources set and will never match"
        );
        return false;
    }

    if resources.infrastructure_cluster && holder_is_infrastructure_cluster(holder) {
        return true;
    }

    if resources.control_plane && holder_is_control_plane(holder) {
        return true;
    }

    if let Some(classes) = &resources.machine_deployment_class {
        if holder_is_machine_deployment(holder) {
            return machine_deployment_class(variables)
                .is_some_and(|class| classes.names.iter().any(|p| class_name_matches(p, &class)));
        }
    }

    false
}

fn gvk_matches(selector: &PatchSelector, object: &Value) -> bool {
    let api_version = object.get("apiVersion").and_then(Value::as_str);
    let kind = object.get("kind").and_then(Value::as_str);
    api_version == Some(selector.api_version.as_str()) && kind == Some(selector.kind.as_str())
}

fn holder_is_infrastructure_cluster(holder: &HolderReference) -> bool {
    holder.kind == CLUSTER_KIND && holder.field_path == INFRASTRUCTURE_REF_FIELD_PATH
}

fn holder_is_control_plane(holder: &HolderReference) -> bool {
    (holder.kind == CLUSTER_KIND && holder.field_path == CONTROL_PLANE_REF_FIELD_PATH)
        || holder.field_path == CONTROL_PLANE_MACHINE_TEMPLATE_FIELD_PATH
}

fn holder_is_machine_deployment(holder: &HolderReference) -> bool {
    holder.kind == MACHINE_DEPLOYMENT_KIND
        && (holder.field_path == MACHINE_DEPLOYMENT_INFRASTRUCTURE_FIELD_PATH
            || holder.field_path == MACHINE_DEPLOYMENT_BOOTSTRAP_FIELD_PATH)
}

fn machine_deployment_class(variables: &VariableMap) -> Option<String> {
    match get::<String>(variables, BUILTINS_VARIABLE_NAME, &["machineDeployment", "class"]) {
        Ok(class) => class,
        Err(e) => {
            debug!(error = %e, "unable to read builtin machine deployment class");
            None
        }
    }
}

/// Match a machine deployment class name against a pattern
///
/// Supported patterns are an exact name, `*`, `prefix*`, and `*suffix`. Any
/// other placement of `*` never matches.
pub fn class_name_matches(pattern: &str, class: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.matches('*').count() {
        0 => pattern == class,
        1 => {
            if let Some(suffix) = pattern.strip_prefix('*') {
                class.ends_with(suffix)
            } else if let Some(prefix) = pattern.strip_suffix('*') {
                class.starts_with(prefix)
            } else {
                false
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_common::hooks::{
        ClusterVariable, MachineDeploymentClassSelector, PatchSelectorMatch,
    };

    use crate::variables::variable_map;

    fn azure_cluster_template() -> Value {
        json!({
            "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
            "kind": "AzureClusterTemplate",
            "spec": {}
        })
    }

    fn kubeadm_config_template() -> Value {
        json!({
            "apiVersion": "bootstrap.cluster.x-k8s.io/v1beta1",
            "kind": "KubeadmConfigTemplate",
            "spec": {}
        })
    }

    fn selector(
        api_version: &str,
        kind: &str,
        match_resources: PatchSelectorMatch,
    ) -> PatchSelector {
        PatchSelector {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            match_resources,
        }
    }

    fn infra_selector() -> PatchSelector {
        selector(
            "infrastructure.cluster.x-k8s.io/v1beta1",
            "AzureClusterTemplate",
            PatchSelectorMatch {
                infrastructure_cluster: true,
                ..Default::default()
            },
        )
    }

    fn worker_selector(names: &[&str]) -> PatchSelector {
        selector(
            "bootstrap.cluster.x-k8s.io/v1beta1",
            "KubeadmConfigTemplate",
            PatchSelectorMatch {
                machine_deployment_class: Some(MachineDeploymentClassSelector {
                    names: names.iter().map(|n| n.to_string()).collect(),
                }),
                ..Default::default()
            },
        )
    }

    fn holder(kind: &str, field_path: &str) -> HolderReference {
        HolderReference {
            api_version: "cluster.x-k8s.io/v1beta1".to_string(),
            kind: kind.to_string(),
            namespace: "default".to_string(),
            name: "test".to_string(),
            field_path: field_path.to_string(),
        }
    }

    fn class_vars(class: &str) -> VariableMap {
        variable_map(&[ClusterVariable::new(
            "builtin",
            json!({"machineDeployment": {"class": class}}),
        )])
    }

    // ==========================================================================
    // Story Tests: Placing Objects in the Cluster Graph
    // ==========================================================================

    /// Story: the infrastructure cluster template referenced by the Cluster
    /// is in scope for an infrastructureCluster selector.
    #[test]
    fn story_infrastructure_cluster_matches() {
        assert!(matches(
            &infra_selector(),
            &azure_cluster_template(),
            &holder("Cluster", "spec.infrastructureRef"),
            &VariableMap::new(),
        ));
    }

    /// Story: the same object referenced as a control plane is not an
    /// infrastructure cluster.
    #[test]
    fn story_control_plane_ref_does_not_match_infrastructure_selector() {
        assert!(!matches(
            &infra_selector(),
            &azure_cluster_template(),
            &holder("Cluster", "spec.controlPlaneRef"),
            &VariableMap::new(),
        ));
    }

    /// Story: worker bootstrap templates match when the deployment's class
    /// matches one of the selector's name patterns.
    #[test]
    fn story_machine_deployment_class_patterns() {
        let holder = holder("MachineDeployment", "spec.template.spec.bootstrap.configRef");
        let vars = class_vars("default-worker");

        assert!(matches(
            &worker_selector(&["default-*"]),
            &kubeadm_config_template(),
            &holder,
            &vars,
        ));
        assert!(!matches(
            &worker_selector(&["other"]),
            &kubeadm_config_template(),
            &holder,
            &vars,
        ));
    }

    // ==========================================================================
    // GVK gate
    // ==========================================================================

    #[test]
    fn gvk_mismatch_never_matches() {
        let mut object = azure_cluster_template();
        object["kind"] = json!("AzureMachineTemplate");
        assert!(!matches(
            &infra_selector(),
            &object,
            &holder("Cluster", "spec.infrastructureRef"),
            &VariableMap::new(),
        ));

        let mut object = azure_cluster_template();
        object["apiVersion"] = json!("infrastructure.cluster.x-k8s.io/v1beta2");
        assert!(!matches(
            &infra_selector(),
            &object,
            &holder("Cluster", "spec.infrastructureRef"),
            &VariableMap::new(),
        ));
    }

    #[test]
    fn object_without_gvk_never_matches() {
        assert!(!matches(
            &infra_selector(),
            &json!({"spec": {}}),
            &holder("Cluster", "spec.infrastructureRef"),
            &VariableMap::new(),
        ));
    }

    // ==========================================================================
    // Match resources
    // ==========================================================================

    #[test]
    fn empty_match_resources_never_match() {
        let empty = selector(
            "infrastructure.cluster.x-k8s.io/v1beta1",
            "AzureClusterTemplate",
            PatchSelectorMatch::default(),
        );
        for field_path in [
            "spec.infrastructureRef",
            "spec.controlPlaneRef",
            "spec.machineTemplate.infrastructureRef",
        ] {
            assert!(!matches(
                &empty,
                &azure_cluster_template(),
                &holder("Cluster", field_path),
                &class_vars("default-worker"),
            ));
        }
    }

    #[test]
    fn control_plane_matches_cluster_ref_and_machine_template() {
        let cp = selector(
            "infrastructure.cluster.x-k8s.io/v1beta1",
            "DockerMachineTemplate",
            PatchSelectorMatch {
                control_plane: true,
                ..Default::default()
            },
        );
        let object = json!({
            "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
            "kind": "DockerMachineTemplate"
        });

        assert!(matches(
            &cp,
            &object,
            &holder("Cluster", "spec.controlPlaneRef"),
            &VariableMap::new()
        ));
        assert!(matches(
            &cp,
            &object,
            &holder("KubeadmControlPlane", "spec.machineTemplate.infrastructureRef"),
            &VariableMap::new()
        ));
        assert!(!matches(
            &cp,
            &object,
            &holder("MachineDeployment", "spec.template.spec.infrastructureRef"),
            &VariableMap::new()
        ));
    }

    #[test]
    fn machine_deployment_requires_known_field_path() {
        let vars = class_vars("workers");
        let selector = worker_selector(&["*"]);

        assert!(matches(
            &selector,
            &kubeadm_config_template(),
            &holder("MachineDeployment", "spec.template.spec.infrastructureRef"),
            &vars,
        ));
        assert!(!matches(
            &selector,
            &kubeadm_config_template(),
            &holder("MachineDeployment", "spec.template.metadata"),
            &vars,
        ));
        assert!(!matches(
            &selector,
            &kubeadm_config_template(),
            &holder("Cluster", "spec.template.spec.bootstrap.configRef"),
            &vars,
        ));
    }

    #[test]
    fn machine_deployment_without_builtin_class_does_not_match() {
        assert!(!matches(
            &worker_selector(&["*"]),
            &kubeadm_config_template(),
            &holder("MachineDeployment", "spec.template.spec.bootstrap.configRef"),
            &VariableMap::new(),
        ));
    }

    #[test]
    fn malformed_builtin_class_does_not_match() {
        let vars = variable_map(&[ClusterVariable::new(
            "builtin",
            json!({"machineDeployment": {"class": 42}}),
        )]);
        assert!(!matches(
            &worker_selector(&["*"]),
            &kubeadm_config_template(),
            &holder("MachineDeployment", "spec.template.spec.bootstrap.configRef"),
            &vars,
        ));
    }

    #[test]
    fn any_configured_position_may_match() {
        let both = selector(
            "bootstrap.cluster.x-k8s.io/v1beta1",
            "KubeadmConfigTemplate",
            PatchSelectorMatch {
                control_plane: true,
                machine_deployment_class: Some(MachineDeploymentClassSelector {
                    names: vec!["workers".to_string()],
                }),
                ..Default::default()
            },
        );

        assert!(matches(
            &both,
            &kubeadm_config_template(),
            &holder("MachineDeployment", "spec.template.spec.bootstrap.configRef"),
            &class_vars("workers"),
        ));
        assert!(matches(
            &both,
            &kubeadm_config_template(),
            &holder("Cluster", "spec.controlPlaneRef"),
            &class_vars("workers"),
        ));
    }

    // ==========================================================================
    // Class name patterns
    // ==========================================================================

    #[test]
    fn class_name_patterns() {
        assert!(class_name_matches("class-*", "class-A"));
        assert!(class_name_matches("*-A", "class-A"));
        assert!(class_name_matches("*", "class-A"));
        assert!(class_name_matches("*", ""));
        assert!(class_name_matches("classA", "classA"));

        assert!(!class_name_matches("classA", "classB"));
        assert!(!class_name_matches("classA", "classA-1"));
        assert!(!class_name_matches("class-*", "other-A"));
        assert!(!class_name_matches("*-A", "class-B"));
    }

    #[test]
    fn unsupported_wildcards_never_match() {
        assert!(!class_name_matches("class-*-A", "class-x-A"));
        assert!(!class_name_matches("*class*", "class"));
        assert!(!class_name_matches("**", "anything"));
        assert!(!class_name_matches("c*A", "cA"));
    }
}
