//! Cluster lifecycle hook handlers
//!
//! Lifecycle handlers act on the live Cluster rather than on templated
//! objects. Kubernetes access goes through [`ClusterClient`] so handlers can
//! be tested without an API server.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use trellis_common::hooks::{ClusterVariable, Hook, HookResponse, LifecycleRequest};
use trellis_common::variables::{GlobalImageRegistryMirror, CLUSTER_CONFIG_VARIABLE_NAME};
use trellis_common::{Error, Result};
use trellis_patches::handlers::registry_mirror::GLOBAL_IMAGE_REGISTRY_MIRROR;
use trellis_patches::variables::variable_map;

/// Handler name for the registry mirror defaults handler
pub const REGISTRY_MIRROR_DEFAULTS_HANDLER: &str = "registry-mirror-defaults";

/// Trait abstracting the Cluster writes lifecycle handlers make
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Replace `spec.topology.variables` on a Cluster
    async fn patch_topology_variables(
        &self,
        namespace: &str,
        name: &str,
        variables: Vec<ClusterVariable>,
    ) -> Result<()>;
}

/// [`ClusterClient`] backed by the Kubernetes API
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a client for CAPI Clusters
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn clusters(&self, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("cluster.x-k8s.io", "v1beta1", "Cluster");
        Api::namespaced_with(self.client.clone(), namespace, &ApiResource::from_gvk(&gvk))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn patch_topology_variables(
        &self,
        namespace: &str,
        name: &str,
        variables: Vec<ClusterVariable>,
    ) -> Result<()> {
        let patch = serde_json::json!({ "spec": { "topology": { "variables": variables } } });
        self.clusters(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        info!(cluster = %name, namespace = %namespace, "patched cluster topology variables");
        Ok(())
    }
}

/// A handler for one cluster lifecycle hook
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Handler name as registered with CAPI
    fn name(&self) -> &str;

    /// The hook this handler serves
    fn hook(&self) -> Hook;

    /// Answer the hook
    async fn call(&self, request: &LifecycleRequest) -> HookResponse;
}

// =============================================================================
// Registry mirror defaults
// =============================================================================

/// Writes a default global image registry mirror into new Clusters
///
/// Runs on BeforeClusterCreate. Clusters that already set
/// `clusterConfig.globalImageRegistryMirror` are left alone.
pub struct RegistryMirrorDefaults {
    mirror: GlobalImageRegistryMirror,
    client: Arc<dyn ClusterClient>,
    retry_after_seconds: i32,
}

impl RegistryMirrorDefaults {
    /// Create the handler
    pub fn new(
        mirror_url: impl Into<String>,
        client: Arc<dyn ClusterClient>,
        retry_after_seconds: i32,
    ) -> Self {
        Self {
            mirror: GlobalImageRegistryMirror {
                url: mirror_url.into(),
            },
            client,
            retry_after_seconds,
        }
    }

    /// Variables to write back, or `None` when the Cluster needs no change
    fn defaulted_variables(&self, cluster: &Value) -> Result<Option<Vec<ClusterVariable>>> {
        let Some(raw) = cluster.pointer("/spec/topology/variables") else {
            return Ok(None);
        };
        let mut variables: Vec<ClusterVariable> = serde_json::from_value(raw.clone())
            .map_err(|e| Error::serialization(format!("cluster topology variables: {e}")))?;

        let mut map = variable_map(&variables);
        if GLOBAL_IMAGE_REGISTRY_MIRROR
            .get::<GlobalImageRegistryMirror>(&map)?
            .is_some()
        {
            return Ok(None);
        }
        GLOBAL_IMAGE_REGISTRY_MIRROR.set(&self.mirror, &mut map)?;

        let Some(cluster_config) = map.remove(CLUSTER_CONFIG_VARIABLE_NAME) else {
            return Err(Error::internal("clusterConfig missing after set"));
        };
        match variables
            .iter_mut()
            .find(|v| v.name == CLUSTER_CONFIG_VARIABLE_NAME)
        {
            Some(existing) => existing.value = cluster_config,
            None => variables.push(ClusterVariable::new(
                CLUSTER_CONFIG_VARIABLE_NAME,
                cluster_config,
            )),
        }
        Ok(Some(variables))
    }

    fn failure(&self, message: impl Into<String>, retry: bool) -> HookResponse {
        let response = HookResponse::failure(self.hook(), message);
        if retry {
            response.with_retry_after(self.hook(), self.retry_after_seconds)
        } else {
            response
        }
    }
}

#[async_trait]
impl LifecycleHandler for RegistryMirrorDefaults {
    fn name(&self) -> &str {
        REGISTRY_MIRROR_DEFAULTS_HANDLER
    }

    fn hook(&self) -> Hook {
        Hook::BeforeClusterCreate
    }

    #[instrument(skip_all, fields(handler = REGISTRY_MIRROR_DEFAULTS_HANDLER))]
    async fn call(&self, request: &LifecycleRequest) -> HookResponse {
        let cluster = &request.cluster;
        let name = cluster.pointer("/metadata/name").and_then(Value::as_str);
        let namespace = cluster
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or("default");
        let Some(name) = name else {
            return self.failure("cluster has no metadata.name", false);
        };

        let variables = match self.defaulted_variables(cluster) {
            Ok(Some(variables)) => variables,
            Ok(None) => {
                debug!(cluster = %name, "cluster needs no registry mirror default");
                return HookResponse::success(self.hook());
            }
            Err(e) => {
                warn!(cluster = %name, error = %e, "invalid cluster variables");
                return self.failure(e.to_string(), false);
            }
        };

        match self
            .client
            .patch_topology_variables(namespace, name, variables)
            .await
        {
            Ok(()) => {
                info!(cluster = %name, mirror = %self.mirror.url, "defaulted registry mirror");
                HookResponse::success(self.hook())
            }
            Err(e) => {
                warn!(cluster = %name, error = %e, "failed to patch cluster");
                self.failure(e.to_string(), e.is_retryable())
            }
        }
    }
}
