//! Fixtures shared by the feature mutator tests

use json_patch::PatchOperation;
use jsonptr::PointerBuf;
use serde_json::{json, Value};

use trellis_common::hooks::{ClusterVariable, GeneratePatchesRequestItem, HolderReference};
use trellis_common::templates::{
    AWS_API_VERSION, CAPI_BOOTSTRAP_API_VERSION, CAPI_CLUSTER_API_VERSION,
    CAPI_CONTROLPLANE_API_VERSION, DOCKER_API_VERSION,
};
use trellis_common::variables::BUILTINS_VARIABLE_NAME;
use trellis_common::Result;

use crate::handler::Mutate;
use crate::mutation::PatchSet;
use crate::objects::ObjectRegistry;
use crate::variables::merge_variable_maps;
use crate::variables::variable_map;

// =============================================================================
// Templates
// =============================================================================

pub(crate) fn kubeadm_control_plane_template() -> Value {
    json!({
        "apiVersion": CAPI_CONTROLPLANE_API_VERSION,
        "kind": "KubeadmControlPlaneTemplate",
        "metadata": {"name": "cp", "namespace": "default"},
        "spec": {"template": {"spec": {"kubeadmConfigSpec": {
            "clusterConfiguration": {"apiServer": {"certSANs": ["localhost"]}}
        }}}}
    })
}

pub(crate) fn kubeadm_config_template() -> Value {
    json!({
        "apiVersion": CAPI_BOOTSTRAP_API_VERSION,
        "kind": "KubeadmConfigTemplate",
        "metadata": {"name": "workers", "namespace": "default"},
        "spec": {"template": {"spec": {}}}
    })
}

pub(crate) fn docker_machine_template() -> Value {
    json!({
        "apiVersion": DOCKER_API_VERSION,
        "kind": "DockerMachineTemplate",
        "metadata": {"name": "machines", "namespace": "default"},
        "spec": {"template": {"spec": {}}}
    })
}

pub(crate) fn aws_machine_template() -> Value {
    json!({
        "apiVersion": AWS_API_VERSION,
        "kind": "AWSMachineTemplate",
        "metadata": {"name": "machines", "namespace": "default"},
        "spec": {"template": {"spec": {"iamInstanceProfile": "nodes.cluster-api-provider-aws.sigs.k8s.io"}}}
    })
}

pub(crate) fn aws_cluster_template() -> Value {
    json!({
        "apiVersion": AWS_API_VERSION,
        "kind": "AWSClusterTemplate",
        "metadata": {"name": "cluster", "namespace": "default"},
        "spec": {"template": {"spec": {}}}
    })
}

// =============================================================================
// Request items
// =============================================================================

fn holder(kind: &str, field_path: &str) -> HolderReference {
    HolderReference {
        api_version: CAPI_CLUSTER_API_VERSION.to_string(),
        kind: kind.to_string(),
        namespace: "default".to_string(),
        name: "test".to_string(),
        field_path: field_path.to_string(),
    }
}

fn item(
    uid: &str,
    holder: HolderReference,
    object: Value,
    builtin: Value,
) -> GeneratePatchesRequestItem {
    GeneratePatchesRequestItem {
        uid: uid.to_string(),
        holder_reference: holder,
        object,
        variables: vec![ClusterVariable::new(BUILTINS_VARIABLE_NAME, builtin)],
    }
}

/// Object referenced by the Cluster's `spec.controlPlaneRef`
pub(crate) fn control_plane_item(uid: &str, object: Value) -> GeneratePatchesRequestItem {
    item(
        uid,
        holder("Cluster", "spec.controlPlaneRef"),
        object,
        json!({"cluster": {"name": "test", "namespace": "default"}}),
    )
}

/// Object referenced by the Cluster's `spec.infrastructureRef`
pub(crate) fn infrastructure_cluster_item(uid: &str, object: Value) -> GeneratePatchesRequestItem {
    item(
        uid,
        holder("Cluster", "spec.infrastructureRef"),
        object,
        json!({"cluster": {"name": "test", "namespace": "default"}}),
    )
}

/// Machine template of the control plane, with an optional control plane version
pub(crate) fn control_plane_machine_item(
    uid: &str,
    object: Value,
    version: Option<&str>,
) -> GeneratePatchesRequestItem {
    let mut builtin = json!({"cluster": {"name": "test", "namespace": "default"}});
    if let Some(version) = version {
        builtin["controlPlane"] = json!({"version": version, "name": "test-cp"});
    }
    item(
        uid,
        holder("KubeadmControlPlane", "spec.machineTemplate.infrastructureRef"),
        object,
        builtin,
    )
}

/// Bootstrap template of a machine deployment of `class`
pub(crate) fn worker_bootstrap_item(
    uid: &str,
    object: Value,
    class: &str,
) -> GeneratePatchesRequestItem {
    item(
        uid,
        holder("MachineDeployment", "spec.template.spec.bootstrap.configRef"),
        object,
        json!({"machineDeployment": {"class": class, "name": "md-0", "topologyName": "md-0"}}),
    )
}

/// Infrastructure template of a machine deployment of `class`
pub(crate) fn worker_machine_item(
    uid: &str,
    object: Value,
    class: &str,
    version: Option<&str>,
) -> GeneratePatchesRequestItem {
    let mut builtin =
        json!({"machineDeployment": {"class": class, "name": "md-0", "topologyName": "md-0"}});
    if let Some(version) = version {
        builtin["machineDeployment"]["version"] = json!(version);
    }
    item(
        uid,
        holder("MachineDeployment", "spec.template.spec.infrastructureRef"),
        object,
        builtin,
    )
}

// =============================================================================
// Running mutators
// =============================================================================

/// Run `mutators` for one item the way a meta handler does
pub(crate) fn run(
    mutators: &[Box<dyn Mutate>],
    variables: &[ClusterVariable],
    item: &GeneratePatchesRequestItem,
) -> Result<PatchSet> {
    let registry = ObjectRegistry::with_all_kinds();
    let variables = merge_variable_maps(&variable_map(variables), &item.variables);
    let mut patches = PatchSet::new();
    for mutator in mutators {
        mutator.generate(&registry, item, &variables, &mut patches)?;
    }
    Ok(patches)
}

/// The item's object after running `mutators`
pub(crate) fn patched(
    mutators: &[Box<dyn Mutate>],
    variables: &[ClusterVariable],
    item: &GeneratePatchesRequestItem,
) -> Value {
    run(mutators, variables, item)
        .unwrap()
        .current(&item.uid, &item.object)
        .clone()
}

/// Value of the add operation at `tokens`, if any
pub(crate) fn added_value<'a>(ops: &'a [PatchOperation], tokens: &[&str]) -> Option<&'a Value> {
    let path = PointerBuf::from_tokens(tokens.iter().copied());
    ops.iter().find_map(|op| match op {
        PatchOperation::Add(add) if add.path == path => Some(&add.value),
        _ => None,
    })
}
