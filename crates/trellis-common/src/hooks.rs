//! Runtime Hooks wire types (`hooks.runtime.cluster.x-k8s.io/v1alpha1`)
//!
//! CAPI's topology controller calls the extension with JSON bodies typed by a
//! hook catalog. Every request and response carries `apiVersion`/`kind`; the
//! constructors here fill them in so handlers only deal with payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::JsonSchemaProps;
use crate::RUNTIME_HOOKS_API_VERSION;

// =============================================================================
// Hook catalog
// =============================================================================

/// Every hook this extension knows how to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {
    /// Advertise variable definitions and their schemas
    DiscoverVariables,
    /// Compute JSON Patches for templated objects
    GeneratePatches,
    /// Validate resolved variables against a topology
    ValidateTopology,
    /// Called before a Cluster's topology is first reconciled
    BeforeClusterCreate,
    /// Called once the control plane is reachable
    AfterControlPlaneInitialized,
    /// Called before a topology version upgrade starts
    BeforeClusterUpgrade,
    /// Called after the control plane has been upgraded
    AfterControlPlaneUpgrade,
    /// Called after the whole cluster has been upgraded
    AfterClusterUpgrade,
    /// Called before a Cluster is deleted
    BeforeClusterDelete,
}

/// All hooks, in catalog order
pub const ALL_HOOKS: &[Hook] = &[
    Hook::DiscoverVariables,
    Hook::GeneratePatches,
    Hook::ValidateTopology,
    Hook::BeforeClusterCreate,
    Hook::AfterControlPlaneInitialized,
    Hook::BeforeClusterUpgrade,
    Hook::AfterControlPlaneUpgrade,
    Hook::AfterClusterUpgrade,
    Hook::BeforeClusterDelete,
];

impl Hook {
    /// Hook name as it appears in the catalog and in discovery
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiscoverVariables => "DiscoverVariables",
            Self::GeneratePatches => "GeneratePatches",
            Self::ValidateTopology => "ValidateTopology",
            Self::BeforeClusterCreate => "BeforeClusterCreate",
            Self::AfterControlPlaneInitialized => "AfterControlPlaneInitialized",
            Self::BeforeClusterUpgrade => "BeforeClusterUpgrade",
            Self::AfterControlPlaneUpgrade => "AfterControlPlaneUpgrade",
            Self::AfterClusterUpgrade => "AfterClusterUpgrade",
            Self::BeforeClusterDelete => "BeforeClusterDelete",
        }
    }

    /// URL path segment CAPI uses when calling the hook (lowercased name)
    pub fn path_segment(&self) -> String {
        self.name().to_ascii_lowercase()
    }

    /// Resolve a hook from its URL path segment
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        ALL_HOOKS
            .iter()
            .copied()
            .find(|hook| hook.name().eq_ignore_ascii_case(segment))
    }

    /// Whether this is a cluster lifecycle hook (as opposed to a topology mutation hook)
    pub fn is_lifecycle(&self) -> bool {
        !matches!(
            self,
            Self::DiscoverVariables | Self::GeneratePatches | Self::ValidateTopology
        )
    }

    /// Whether the hook's response may carry `retryAfterSeconds`
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::BeforeClusterCreate
                | Self::BeforeClusterUpgrade
                | Self::AfterControlPlaneUpgrade
                | Self::BeforeClusterDelete
        )
    }

    /// Kind of the request body for this hook
    pub fn request_kind(&self) -> String {
        format!("{}Request", self.name())
    }

    /// Kind of the response body for this hook
    pub fn response_kind(&self) -> String {
        format!("{}Response", self.name())
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_segment(s).ok_or_else(|| format!("unknown hook '{s}'"))
    }
}

// =============================================================================
// Common response fields
// =============================================================================

/// Outcome of a hook call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// The call succeeded
    #[default]
    Success,
    /// The call failed; `message` explains why
    Failure,
}

/// What CAPI does when the extension is unreachable or fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Ignore the failure and continue reconciling
    Ignore,
    /// Fail the reconcile
    #[default]
    Fail,
}

fn runtime_hooks_api_version() -> String {
    RUNTIME_HOOKS_API_VERSION.to_string()
}

// =============================================================================
// Variables and object references
// =============================================================================

/// A resolved cluster variable as sent by CAPI
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVariable {
    /// Variable name (e.g., "clusterConfig", "builtin")
    pub name: String,
    /// Opaque JSON value
    #[serde(default)]
    pub value: serde_json::Value,
    /// Patch name the definition came from, when variable definitions conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_from: Option<String>,
}

impl ClusterVariable {
    /// Create a variable with the given name and value
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
            definition_from: None,
        }
    }
}

/// Where a templated object sits in the Cluster's object graph
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderReference {
    /// apiVersion of the holder object
    pub api_version: String,
    /// kind of the holder object (e.g., "Cluster", "MachineDeployment")
    pub kind: String,
    /// Namespace of the holder object
    #[serde(default)]
    pub namespace: String,
    /// Name of the holder object
    #[serde(default)]
    pub name: String,
    /// Field path in the holder that references the templated object
    pub field_path: String,
}

/// Which templated objects a patch applies to
///
/// Same shape as a ClusterClass inline patch selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSelector {
    /// apiVersion the object must have
    pub api_version: String,
    /// kind the object must have
    pub kind: String,
    /// Structural positions the object may occupy
    #[serde(default)]
    pub match_resources: PatchSelectorMatch,
}

/// Structural positions a [`PatchSelector`] applies to
///
/// Unset or false fields never match; an empty value matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSelectorMatch {
    /// The infrastructure cluster template referenced by the Cluster
    #[serde(default)]
    pub infrastructure_cluster: bool,
    /// The control plane template, or the infrastructure machine template it references
    #[serde(default)]
    pub control_plane: bool,
    /// Bootstrap and infrastructure templates of matching machine deployment classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_deployment_class: Option<MachineDeploymentClassSelector>,
}

/// Machine deployment classes a selector applies to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentClassSelector {
    /// Class name patterns: exact, `prefix*`, `*suffix`, or `*`
    #[serde(default)]
    pub names: Vec<String>,
}

/// Variable definition advertised by DiscoverVariables
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterClassVariable {
    /// Variable name
    pub name: String,
    /// Whether a Cluster must set this variable
    pub required: bool,
    /// OpenAPI v3 schema of the variable value
    pub schema: VariableSchema,
}

/// Wrapper CAPI uses around a variable's OpenAPI schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableSchema {
    /// The schema itself
    #[serde(rename = "openAPIV3Schema")]
    pub open_api_v3_schema: JsonSchemaProps,
}

// =============================================================================
// Discovery
// =============================================================================

/// Hook reference inside a discovery handler entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionHook {
    /// Hook API group and version
    pub api_version: String,
    /// Hook name (e.g., "GeneratePatches")
    pub hook: String,
}

/// One handler advertised to CAPI
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionHandler {
    /// Handler name; combined with the hook to form the call path
    pub name: String,
    /// Hook served by this handler
    pub request_hook: GroupVersionHook,
    /// Per-call timeout CAPI should apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    /// Behaviour when the handler fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
}

/// Response to the discovery call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    /// Always the runtime hooks API version
    #[serde(default = "runtime_hooks_api_version")]
    pub api_version: String,
    /// Always "DiscoveryResponse"
    #[serde(default)]
    pub kind: String,
    /// Outcome of the call
    #[serde(default)]
    pub status: ResponseStatus,
    /// Failure detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Handlers served by this extension
    #[serde(default)]
    pub handlers: Vec<ExtensionHandler>,
}

impl DiscoveryResponse {
    /// Create a successful discovery response
    pub fn new(handlers: Vec<ExtensionHandler>) -> Self {
        Self {
            api_version: runtime_hooks_api_version(),
            kind: "DiscoveryResponse".to_string(),
            status: ResponseStatus::Success,
            message: String::new(),
            handlers,
        }
    }
}

// =============================================================================
// DiscoverVariables
// =============================================================================

/// DiscoverVariables request (no payload beyond settings)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverVariablesRequest {
    /// Hook API version
    #[serde(default = "runtime_hooks_api_version")]
    pub api_version: String,
    /// Always "DiscoverVariablesRequest"
    #[serde(default)]
    pub kind: String,
    /// Free-form settings from the ExtensionConfig
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// DiscoverVariables response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverVariablesResponse {
    /// Hook API version
    pub api_version: String,
    /// Always "DiscoverVariablesResponse"
    pub kind: String,
    /// Outcome of the call
    pub status: ResponseStatus,
    /// Failure detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Advertised variable definitions
    #[serde(default)]
    pub variables: Vec<ClusterClassVariable>,
}

impl Default for DiscoverVariablesResponse {
    fn default() -> Self {
        Self {
            api_version: runtime_hooks_api_version(),
            kind: Hook::DiscoverVariables.response_kind(),
            status: ResponseStatus::Success,
            message: String::new(),
            variables: Vec::new(),
        }
    }
}

impl DiscoverVariablesResponse {
    /// Mark the response failed, dropping any partially collected variables
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ResponseStatus::Failure;
        self.message = message.into();
        self.variables.clear();
    }
}

// =============================================================================
// GeneratePatches
// =============================================================================

/// GeneratePatches request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePatchesRequest {
    /// Hook API version
    #[serde(default = "runtime_hooks_api_version")]
    pub api_version: String,
    /// Always "GeneratePatchesRequest"
    #[serde(default)]
    pub kind: String,
    /// Free-form settings from the ExtensionConfig
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// Variables shared by every item
    #[serde(default)]
    pub variables: Vec<ClusterVariable>,
    /// Templated objects to patch
    #[serde(default)]
    pub items: Vec<GeneratePatchesRequestItem>,
}

/// One templated object in a GeneratePatches request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePatchesRequestItem {
    /// Correlates the response item with this request item
    pub uid: String,
    /// Where the object sits in the Cluster's object graph
    pub holder_reference: HolderReference,
    /// The templated object
    pub object: serde_json::Value,
    /// Item-scoped variables overriding the request-level ones
    #[serde(default)]
    pub variables: Vec<ClusterVariable>,
}

/// Encoding of a response item's patch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    /// RFC 6902 JSON Patch
    #[default]
    #[serde(rename = "JSONPatch")]
    JsonPatch,
    /// RFC 7386 JSON Merge Patch
    #[serde(rename = "JSONMergePatch")]
    JsonMergePatch,
}

/// Patch for one request item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePatchesResponseItem {
    /// uid of the request item this patch applies to
    pub uid: String,
    /// Patch encoding
    pub patch_type: PatchType,
    /// Patch document bytes (base64 on the wire)
    #[serde(with = "base64_bytes")]
    pub patch: Vec<u8>,
}

/// GeneratePatches response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePatchesResponse {
    /// Hook API version
    pub api_version: String,
    /// Always "GeneratePatchesResponse"
    pub kind: String,
    /// Outcome of the call
    pub status: ResponseStatus,
    /// Failure detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Patches, at most one per request item
    #[serde(default)]
    pub items: Vec<GeneratePatchesResponseItem>,
}

impl Default for GeneratePatchesResponse {
    fn default() -> Self {
        Self {
            api_version: runtime_hooks_api_version(),
            kind: Hook::GeneratePatches.response_kind(),
            status: ResponseStatus::Success,
            message: String::new(),
            items: Vec::new(),
        }
    }
}

impl GeneratePatchesResponse {
    /// Mark the response failed; generation is all-or-nothing so items are dropped
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ResponseStatus::Failure;
        self.message = message.into();
        self.items.clear();
    }
}

// =============================================================================
// ValidateTopology
// =============================================================================

/// ValidateTopology request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTopologyRequest {
    /// Hook API version
    #[serde(default = "runtime_hooks_api_version")]
    pub api_version: String,
    /// Always "ValidateTopologyRequest"
    #[serde(default)]
    pub kind: String,
    /// Free-form settings from the ExtensionConfig
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// Variables shared by every item
    #[serde(default)]
    pub variables: Vec<ClusterVariable>,
    /// Templated objects of the topology
    #[serde(default)]
    pub items: Vec<ValidateTopologyRequestItem>,
}

/// One object in a ValidateTopology request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTopologyRequestItem {
    /// Where the object sits in the Cluster's object graph
    pub holder_reference: HolderReference,
    /// The object
    pub object: serde_json::Value,
    /// Item-scoped variables overriding the request-level ones
    #[serde(default)]
    pub variables: Vec<ClusterVariable>,
}

/// Response shared by ValidateTopology and the non-blocking lifecycle hooks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    /// Hook API version
    pub api_version: String,
    /// Response kind (e.g., "ValidateTopologyResponse")
    pub kind: String,
    /// Outcome of the call
    pub status: ResponseStatus,
    /// Failure detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Seconds CAPI should wait before calling again; blocking hooks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i32>,
}

impl HookResponse {
    /// Create a successful response for the given hook
    pub fn success(hook: Hook) -> Self {
        Self {
            api_version: runtime_hooks_api_version(),
            kind: hook.response_kind(),
            status: ResponseStatus::Success,
            message: String::new(),
            retry_after_seconds: None,
        }
    }

    /// Create a failed response for the given hook
    pub fn failure(hook: Hook, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            message: message.into(),
            ..Self::success(hook)
        }
    }

    /// Ask CAPI to call again later; ignored for non-blocking hooks
    pub fn with_retry_after(mut self, hook: Hook, seconds: i32) -> Self {
        if hook.is_blocking() {
            self.retry_after_seconds = Some(seconds);
        }
        self
    }
}

// =============================================================================
// Lifecycle hooks
// =============================================================================

/// Request body shared by the cluster lifecycle hooks
///
/// Each hook sends the Cluster; upgrade hooks add version fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRequest {
    /// Hook API version
    #[serde(default = "runtime_hooks_api_version")]
    pub api_version: String,
    /// Request kind (e.g., "BeforeClusterCreateRequest")
    #[serde(default)]
    pub kind: String,
    /// Free-form settings from the ExtensionConfig
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// The Cluster object
    #[serde(default)]
    pub cluster: serde_json::Value,
    /// Current version (BeforeClusterUpgrade)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_kubernetes_version: Option<String>,
    /// Target version (BeforeClusterUpgrade)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_kubernetes_version: Option<String>,
    /// Version reached (AfterControlPlaneUpgrade, AfterClusterUpgrade)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

// =============================================================================
// Patch byte encoding
// =============================================================================

/// Go marshals `[]byte` as standard base64; mirror that for `patch`
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hook_path_segments_are_lowercase_names() {
        assert_eq!(Hook::GeneratePatches.path_segment(), "generatepatches");
        assert_eq!(
            Hook::from_path_segment("beforeclustercreate"),
            Some(Hook::BeforeClusterCreate)
        );
        assert_eq!(Hook::from_path_segment("nosuchhook"), None);
        for hook in ALL_HOOKS {
            assert_eq!(Hook::from_path_segment(&hook.path_segment()), Some(*hook));
        }
    }

    #[test]
    fn only_lifecycle_hooks_are_lifecycle() {
        assert!(!Hook::GeneratePatches.is_lifecycle());
        assert!(!Hook::DiscoverVariables.is_lifecycle());
        assert!(Hook::BeforeClusterDelete.is_lifecycle());
        assert!(!Hook::AfterClusterUpgrade.is_blocking());
        assert!(Hook::BeforeClusterUpgrade.is_blocking());
    }

    #[test]
    fn generate_patches_request_parses_capi_payload() {
        let body = json!({
            "apiVersion": "hooks.runtime.cluster.x-k8s.io/v1alpha1",
            "kind": "GeneratePatchesRequest",
            "variables": [
                {"name": "clusterConfig", "value": {"etcd": {"image": {"tag": "v3.5.9"}}}}
            ],
            "items": [{
                "uid": "7091de79-e26c-4af5-8be3-071bc4b102c9",
                "holderReference": {
                    "apiVersion": "cluster.x-k8s.io/v1beta1",
                    "kind": "Cluster",
                    "namespace": "default",
                    "name": "demo",
                    "fieldPath": "spec.controlPlaneRef"
                },
                "object": {"apiVersion": "controlplane.cluster.x-k8s.io/v1beta1"},
                "variables": [{"name": "builtin", "value": {"cluster": {"name": "demo"}}}]
            }]
        });

        let req: GeneratePatchesRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.variables.len(), 1);
        assert_eq!(req.items[0].holder_reference.field_path, "spec.controlPlaneRef");
        assert_eq!(req.items[0].variables[0].name, "builtin");
    }

    #[test]
    fn response_item_patch_is_base64_on_the_wire() {
        let item = GeneratePatchesResponseItem {
            uid: "abc".to_string(),
            patch_type: PatchType::JsonPatch,
            patch: br#"[{"op":"add","path":"/a","value":1}]"#.to_vec(),
        };
        let wire = serde_json::to_value(&item).unwrap();
        assert_eq!(wire["patchType"], "JSONPatch");
        assert_eq!(
            wire["patch"],
            "W3sib3AiOiJhZGQiLCJwYXRoIjoiL2EiLCJ2YWx1ZSI6MX1d"
        );

        let back: GeneratePatchesResponseItem = serde_json::from_value(wire).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn failed_generate_response_drops_items() {
        let mut resp = GeneratePatchesResponse::default();
        resp.items.push(GeneratePatchesResponseItem {
            uid: "abc".to_string(),
            patch_type: PatchType::JsonPatch,
            patch: b"[]".to_vec(),
        });
        resp.fail("decode error");
        assert_eq!(resp.status, ResponseStatus::Failure);
        assert!(resp.items.is_empty());
        assert_eq!(resp.kind, "GeneratePatchesResponse");
    }

    #[test]
    fn retry_after_only_set_for_blocking_hooks() {
        let resp = HookResponse::failure(Hook::BeforeClusterCreate, "kube unavailable")
            .with_retry_after(Hook::BeforeClusterCreate, 5);
        assert_eq!(resp.retry_after_seconds, Some(5));

        let resp = HookResponse::failure(Hook::AfterClusterUpgrade, "kube unavailable")
            .with_retry_after(Hook::AfterClusterUpgrade, 5);
        assert_eq!(resp.retry_after_seconds, None);
        let wire = serde_json::to_value(&resp).unwrap();
        assert!(wire.get("retryAfterSeconds").is_none());
    }
}
