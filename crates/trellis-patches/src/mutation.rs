//! Typed mutation pipeline
//!
//! For one `(selector, mutate fn)` pair and one request item:
//!
//! 1. check the selector; most pairs stop here
//! 2. decode the untyped object into its registered template type
//! 3. keep a copy of the decoded value and run the mutate fn on the other
//! 4. diff the two canonical JSON forms into an RFC 6902 patch
//! 5. merge the operations into the item's accumulated patch
//!
//! Both sides are diffed as `serde_json::Value`, whose objects keep their keys
//! sorted, so operations come out in sorted key order (not struct declaration
//! order) and the same before/after pair always yields the same operations.

use json_patch::{Patch, PatchOperation};
use serde_json::Value;
use tracing::{debug, trace};

use trellis_common::hooks::{
    GeneratePatchesRequestItem, GeneratePatchesResponseItem, HolderReference, PatchSelector,
    PatchType,
};
use trellis_common::{Error, Result};

use crate::objects::{ObjectRegistry, TemplateType};
use crate::selectors;
use crate::variables::{get, VariableMap};

/// What a mutate fn can see besides the object itself
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    /// Effective variables for the item (request variables overlaid by item variables)
    pub variables: &'a VariableMap,
    /// Where the object sits in the Cluster's object graph
    pub holder: &'a HolderReference,
}

impl MutationContext<'_> {
    /// Resolve a variable at a field path; see [`crate::variables::get`]
    pub fn get<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        field_path: &[&str],
    ) -> Result<Option<T>> {
        get(self.variables, name, field_path)
    }
}

/// Run `mutate` on `object` if `selector` applies, returning the resulting patch
///
/// Returns `Ok(None)` when the selector does not match or the mutation left
/// the object unchanged. Decode and mutation failures are returned as-is.
pub fn mutate_if_applicable<T, F>(
    registry: &ObjectRegistry,
    object: &Value,
    variables: &VariableMap,
    holder: &HolderReference,
    selector: &PatchSelector,
    mutate: F,
) -> Result<Option<Patch>>
where
    T: TemplateType,
    F: FnOnce(&mut T) -> Result<()>,
{
    if !selectors::matches(selector, object, holder, variables) {
        return Ok(None);
    }

    let before: T = registry.decode_typed(object)?;
    let mut after = before.clone();
    mutate(&mut after)?;

    let kind = T::KIND.kind_str();
    let before = serde_json::to_value(&before)
        .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))?;
    let after = serde_json::to_value(&after)
        .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))?;

    // ops follow sorted key order of the two values
    let patch = json_patch::diff(&before, &after);
    if patch.0.is_empty() {
        Ok(None)
    } else {
        Ok(Some(patch))
    }
}

/// Run a mutation for one request item and merge its patch into `patches`
///
/// The mutation sees the item as already patched by earlier mutations in the
/// same call.
pub fn generate<T, F>(
    registry: &ObjectRegistry,
    handler: &str,
    item: &GeneratePatchesRequestItem,
    variables: &VariableMap,
    selector: &PatchSelector,
    patches: &mut PatchSet,
    mutate: F,
) -> Result<()>
where
    T: TemplateType,
    F: FnOnce(&mut T) -> Result<()>,
{
    let object = patches.current(&item.uid, &item.object);
    let patch = mutate_if_applicable::<T, F>(
        registry,
        object,
        variables,
        &item.holder_reference,
        selector,
        mutate,
    )?;

    let Some(patch) = patch else {
        trace!(handler, uid = %item.uid, "no patch for item");
        return Ok(());
    };

    debug!(
        handler,
        uid = %item.uid,
        kind = T::KIND.kind_str(),
        operations = patch.0.len(),
        "generated patch"
    );
    patches.merge(&item.uid, &item.object, patch)
}

// =============================================================================
// Accumulated patches
// =============================================================================

/// Patches accumulated for the items of one GeneratePatches call
///
/// Each item keeps a working copy of its object with every merged patch
/// applied, so later mutations diff against the already-patched object and
/// never produce operations that contradict earlier ones.
#[derive(Debug, Default)]
pub struct PatchSet {
    entries: Vec<PatchEntry>,
}

#[derive(Debug)]
struct PatchEntry {
    uid: String,
    working: Value,
    operations: Vec<PatchOperation>,
}

impl PatchSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The item's object with all merged patches applied
    pub fn current<'a>(&'a self, uid: &str, original: &'a Value) -> &'a Value {
        self.entry(uid).map(|e| &e.working).unwrap_or(original)
    }

    /// Operations accumulated for an item
    pub fn operations(&self, uid: &str) -> &[PatchOperation] {
        self.entry(uid).map(|e| e.operations.as_slice()).unwrap_or(&[])
    }

    /// Number of items with at least one operation
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.operations.is_empty()).count()
    }

    /// Whether no item has any operation
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a patch to an item's operations and apply it to the working copy
    pub fn merge(&mut self, uid: &str, original: &Value, patch: Patch) -> Result<()> {
        let index = match self.entries.iter().position(|e| e.uid == uid) {
            Some(index) => index,
            None => {
                self.entries.push(PatchEntry {
                    uid: uid.to_string(),
                    working: original.clone(),
                    operations: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        json_patch::patch(&mut entry.working, &patch.0)
            .map_err(|e| Error::patch(format!("applying patch for item {}: {}", uid, e)))?;
        entry.operations.extend(patch.0);
        Ok(())
    }

    /// Encode one response item per patched request item, in first-patched order
    pub fn into_response_items(self) -> Result<Vec<GeneratePatchesResponseItem>> {
        self.entries
            .into_iter()
            .filter(|e| !e.operations.is_empty())
            .map(|e| {
                let patch = serde_json::to_vec(&Patch(e.operations))
                    .map_err(|err| Error::serialization(err.to_string()))?;
                Ok(GeneratePatchesResponseItem {
                    uid: e.uid,
                    patch_type: PatchType::JsonPatch,
                    patch,
                })
            })
            .collect()
    }

    fn entry(&self, uid: &str) -> Option<&PatchEntry> {
        self.entries.iter().find(|e| e.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_common::hooks::PatchSelectorMatch;
    use trellis_common::templates::{KubeadmControlPlaneTemplate, LocalEtcd};

    use crate::objects::TemplateKind;

    const IMAGE_REPOSITORY_PATH: &str =
        "/spec/template/spec/kubeadmConfigSpec/clusterConfiguration/imageRepository";

    fn control_plane_template() -> Value {
        json!({
            "apiVersion": "controlplane.cluster.x-k8s.io/v1beta1",
            "kind": "KubeadmControlPlaneTemplate",
            "metadata": {"name": "cp"},
            "spec": {"template": {"spec": {"kubeadmConfigSpec": {
                "clusterConfiguration": {"apiServer": {"certSANs": ["localhost"]}}
            }}}}
        })
    }

    fn control_plane_selector() -> PatchSelector {
        PatchSelector {
            api_version: "controlplane.cluster.x-k8s.io/v1beta1".to_string(),
            kind: "KubeadmControlPlaneTemplate".to_string(),
            match_resources: PatchSelectorMatch {
                control_plane: true,
                ..Default::default()
            },
        }
    }

    fn control_plane_holder() -> HolderReference {
        HolderReference {
            api_version: "cluster.x-k8s.io/v1beta1".to_string(),
            kind: "Cluster".to_string(),
            namespace: "default".to_string(),
            name: "test".to_string(),
            field_path: "spec.controlPlaneRef".to_string(),
        }
    }

    fn item(uid: &str) -> GeneratePatchesRequestItem {
        GeneratePatchesRequestItem {
            uid: uid.to_string(),
            holder_reference: control_plane_holder(),
            object: control_plane_template(),
            variables: Vec::new(),
        }
    }

    fn set_image_repository(
        repository: &'static str,
    ) -> impl FnOnce(&mut KubeadmControlPlaneTemplate) -> Result<()> {
        move |kcpt| {
            kcpt.spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut()
                .image_repository = Some(repository.to_string());
            Ok(())
        }
    }

    fn run(
        registry: &ObjectRegistry,
        object: &Value,
        mutate: impl FnOnce(&mut KubeadmControlPlaneTemplate) -> Result<()>,
    ) -> Result<Option<Patch>> {
        mutate_if_applicable(
            registry,
            object,
            &VariableMap::new(),
            &control_plane_holder(),
            &control_plane_selector(),
            mutate,
        )
    }

    // ==========================================================================
    // Story Tests: Turning a Typed Mutation into a JSON Patch
    // ==========================================================================

    /// Story: setting a field on the typed object becomes a single add
    /// operation at that field's JSON pointer.
    #[test]
    fn story_mutation_becomes_minimal_patch() {
        let registry = ObjectRegistry::with_all_kinds();

        let patch = run(
            &registry,
            &control_plane_template(),
            set_image_repository("registry.example.com"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "add",
                "path": IMAGE_REPOSITORY_PATH,
                "value": "registry.example.com"
            }])
        );
    }

    /// Story: objects outside the selector are left alone and the mutate fn
    /// never runs.
    #[test]
    fn story_unselected_object_is_skipped() {
        let registry = ObjectRegistry::with_all_kinds();
        let mut holder = control_plane_holder();
        holder.field_path = "spec.infrastructureRef".to_string();

        let patch = mutate_if_applicable::<KubeadmControlPlaneTemplate, _>(
            &registry,
            &control_plane_template(),
            &VariableMap::new(),
            &holder,
            &control_plane_selector(),
            |_| panic!("mutate must not run for unselected objects"),
        )
        .unwrap();

        assert!(patch.is_none());
    }

    /// Story: the same idempotent mutation on the same object yields the
    /// same patch every time, and nothing once the patch is applied.
    #[test]
    fn story_idempotent_mutation_is_stable() {
        let registry = ObjectRegistry::with_all_kinds();
        let object = control_plane_template();

        let first = run(&registry, &object, set_image_repository("r.example.com"))
            .unwrap()
            .unwrap();
        let second = run(&registry, &object, set_image_repository("r.example.com"))
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 1);

        let mut patched = object.clone();
        json_patch::patch(&mut patched, &first.0).unwrap();
        let again = run(&registry, &patched, set_image_repository("r.example.com")).unwrap();
        assert!(again.is_none());
    }

    // ==========================================================================
    // Failure paths
    // ==========================================================================

    #[test]
    fn mutation_error_aborts_without_patch() {
        let registry = ObjectRegistry::with_all_kinds();

        let err = run(&registry, &control_plane_template(), |_| {
            Err(Error::mutation("test", "invalid etcd tag"))
        })
        .unwrap_err();

        assert!(matches!(err, Error::Mutation { .. }));
    }

    #[test]
    fn unregistered_kind_is_an_error_once_selected() {
        let registry = ObjectRegistry::new(&[TemplateKind::KubeadmConfigTemplate]);

        let err = run(
            &registry,
            &control_plane_template(),
            set_image_repository("registry.example.com"),
        )
        .unwrap_err();

        assert!(matches!(err, Error::UnregisteredKind { .. }));
    }

    #[test]
    fn malformed_object_is_a_decode_error() {
        let registry = ObjectRegistry::with_all_kinds();
        let mut object = control_plane_template();
        object["spec"]["template"]["spec"]["kubeadmConfigSpec"]["files"] = json!("not-a-list");

        let err = run(&registry, &object, set_image_repository("r")).unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn no_change_produces_no_patch() {
        let registry = ObjectRegistry::with_all_kinds();
        let patch = run(&registry, &control_plane_template(), |_| Ok(())).unwrap();
        assert!(patch.is_none());
    }

    #[test]
    fn map_fields_diff_in_sorted_key_order() {
        let registry = ObjectRegistry::with_all_kinds();

        let patch = run(&registry, &control_plane_template(), |kcpt| {
            let etcd = kcpt
                .spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut()
                .etcd
                .get_or_insert_with(Default::default);
            let local = etcd.local.get_or_insert_with(LocalEtcd::default);
            local.extra_args.insert("quota-backend-bytes".into(), "8589934592".into());
            local.extra_args.insert("auto-compaction-retention".into(), "1".into());
            Ok(())
        })
        .unwrap()
        .unwrap();

        let encoded = serde_json::to_string(&patch).unwrap();
        let auto = encoded.find("auto-compaction-retention").unwrap();
        let quota = encoded.find("quota-backend-bytes").unwrap();
        assert!(auto < quota);
    }

    #[test]
    fn struct_fields_diff_in_sorted_key_order() {
        let registry = ObjectRegistry::with_all_kinds();

        // imageRepository is declared before etcd on ClusterConfiguration
        let patch = run(&registry, &control_plane_template(), |kcpt| {
            let config = kcpt
                .spec
                .template
                .spec
                .kubeadm_config_spec
                .cluster_configuration_mut();
            config.image_repository = Some("registry.example.com".to_string());
            config
                .etcd
                .get_or_insert_with(Default::default)
                .local
                .get_or_insert_with(LocalEtcd::default)
                .image_tag = Some("v3.5.9".to_string());
            Ok(())
        })
        .unwrap()
        .unwrap();

        let paths: Vec<String> = serde_json::to_value(&patch)
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|op| op["path"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/spec/template/spec/kubeadmConfigSpec/clusterConfiguration/etcd".to_string(),
                IMAGE_REPOSITORY_PATH.to_string(),
            ]
        );
    }

    // ==========================================================================
    // Merging
    // ==========================================================================

    #[test]
    fn later_mutations_see_earlier_patches() {
        let registry = ObjectRegistry::with_all_kinds();
        let item = item("cp-1");
        let vars = VariableMap::new();
        let mut patches = PatchSet::new();

        generate::<KubeadmControlPlaneTemplate, _>(
            &registry,
            "image-repository",
            &item,
            &vars,
            &control_plane_selector(),
            &mut patches,
            set_image_repository("first.example.com"),
        )
        .unwrap();
        generate::<KubeadmControlPlaneTemplate, _>(
            &registry,
            "image-repository-override",
            &item,
            &vars,
            &control_plane_selector(),
            &mut patches,
            set_image_repository("second.example.com"),
        )
        .unwrap();

        let ops = serde_json::to_value(patches.operations("cp-1")).unwrap();
        assert_eq!(
            ops,
            json!([
                {"op": "add", "path": IMAGE_REPOSITORY_PATH, "value": "first.example.com"},
                {"op": "replace", "path": IMAGE_REPOSITORY_PATH, "value": "second.example.com"}
            ])
        );
        assert_eq!(
            patches.current("cp-1", &item.object)["spec"]["template"]["spec"]
                ["kubeadmConfigSpec"]["clusterConfiguration"]["imageRepository"],
            json!("second.example.com")
        );
        assert_eq!(patches.len(), 1);
    }

    #[test]
    fn response_items_only_for_patched_uids() {
        let registry = ObjectRegistry::with_all_kinds();
        let vars = VariableMap::new();
        let mut patches = PatchSet::new();

        for (uid, repository) in [("a", Some("r.example.com")), ("b", None), ("c", Some("r2"))] {
            generate::<KubeadmControlPlaneTemplate, _>(
                &registry,
                "test",
                &item(uid),
                &vars,
                &control_plane_selector(),
                &mut patches,
                |kcpt| {
                    if let Some(repository) = repository {
                        kcpt.spec
                            .template
                            .spec
                            .kubeadm_config_spec
                            .cluster_configuration_mut()
                            .image_repository = Some(repository.to_string());
                    }
                    Ok(())
                },
            )
            .unwrap();
        }

        let items = patches.into_response_items().unwrap();
        let uids: Vec<_> = items.iter().map(|i| i.uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "c"]);

        let decoded: Value = serde_json::from_slice(&items[0].patch).unwrap();
        assert_eq!(decoded[0]["path"], json!(IMAGE_REPOSITORY_PATH));
        assert_eq!(items[0].patch_type, PatchType::JsonPatch);
    }

    #[test]
    fn empty_patch_set_has_no_items() {
        let patches = PatchSet::new();
        assert!(patches.is_empty());
        assert!(patches.operations("missing").is_empty());
        assert!(patches.into_response_items().unwrap().is_empty());
    }
}
