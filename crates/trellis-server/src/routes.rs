//! HTTP routes for the runtime extension
//!
//! Routes:
//! - `POST /hooks.runtime.cluster.x-k8s.io/v1alpha1/discovery` - handlers and hooks served
//! - `POST /hooks.runtime.cluster.x-k8s.io/v1alpha1/{hook}/{handler}` - call a hook
//! - `GET /healthz` - liveness
//! - `GET /readyz` - readiness (at least one handler registered)

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use trellis_common::hooks::{
    DiscoverVariablesRequest, GeneratePatchesRequest, GeneratePatchesResponse, Hook,
    LifecycleRequest, ValidateTopologyRequest,
};
use trellis_common::RUNTIME_HOOKS_API_VERSION;

use crate::error::{Error, Result};
use crate::registry::HandlerRegistry;

/// Shared state for route handlers
pub struct AppState {
    /// Registered handlers
    pub registry: HandlerRegistry,
    /// Per-call deadline for GeneratePatches
    pub timeout: Duration,
}

/// Build the extension router
pub fn router(state: Arc<AppState>) -> Router {
    let base = format!("/{RUNTIME_HOOKS_API_VERSION}");
    Router::new()
        .route(&format!("{base}/discovery"), post(discovery_handler))
        .route(&format!("{base}/{{hook}}/{{handler}}"), post(hook_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

async fn discovery_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.discovery())
}

async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.registry.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no handlers registered")
    } else {
        (StatusCode::OK, "ok")
    }
}

/// Dispatch a hook call to the handler registered for it
async fn hook_handler(
    State(state): State<Arc<AppState>>,
    Path((hook, handler)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response> {
    let hook = Hook::from_path_segment(&hook).ok_or(Error::UnknownHook(hook))?;
    let span = info_span!("hook", hook = %hook, handler = %handler);

    async move {
        debug!(bytes = body.len(), "hook called");
        match hook {
            Hook::DiscoverVariables => {
                let meta = state.registry.patches(hook, &handler)?;
                let request: DiscoverVariablesRequest = decode(&body)?;
                Ok(Json(meta.discover_variables(&request)).into_response())
            }
            Hook::GeneratePatches => {
                let meta = state.registry.patches(hook, &handler)?;
                let request: GeneratePatchesRequest = decode(&body)?;
                let response = generate_patches(meta, request, state.timeout).await?;
                Ok(Json(response).into_response())
            }
            Hook::ValidateTopology => {
                let meta = state.registry.patches(hook, &handler)?;
                let request: ValidateTopologyRequest = decode(&body)?;
                Ok(Json(meta.validate_topology(&request)).into_response())
            }
            lifecycle => {
                let handler = state.registry.lifecycle(lifecycle, &handler)?;
                let request: LifecycleRequest = decode(&body)?;
                Ok(Json(handler.call(&request).await).into_response())
            }
        }
    }
    .instrument(span)
    .await
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::BadRequest(e.to_string()))
}

/// Run GeneratePatches on the blocking pool
async fn generate_patches(
    meta: Arc<trellis_patches::MetaHandler>,
    request: GeneratePatchesRequest,
    timeout: Duration,
) -> Result<GeneratePatchesResponse> {
    run_cancellable(timeout, move |token| meta.generate_patches(&request, token)).await
}

/// Run `generate` on the blocking pool under a per-call cancellation token
///
/// The token is cancelled when this future is dropped (CAPI hung up) or when
/// `timeout` elapses, and the engine stops at the next item. A timeout is
/// answered with a failed response, not an HTTP error, so CAPI applies the
/// handler's failure policy.
async fn run_cancellable<F>(timeout: Duration, generate: F) -> Result<GeneratePatchesResponse>
where
    F: FnOnce(&CancellationToken) -> GeneratePatchesResponse + Send + 'static,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || generate(&token));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(Error::Internal(format!("patch generation task failed: {e}"))),
        Err(_) => {
            cancel.cancel();
            warn!(timeout_ms = timeout.as_millis() as u64, "GeneratePatches timed out");
            let mut response = GeneratePatchesResponse::default();
            response.fail(format!(
                "request cancelled: GeneratePatches exceeded {}ms",
                timeout.as_millis()
            ));
            Ok(response)
        }
    }
}
