//! Capability table
//!
//! Maps each registered handler name to the hooks it serves. Registration is
//! explicit and happens once at startup; discovery and request routing both
//! read from the same table so they cannot disagree.
//!
//! CAPI requires handler names in a discovery response to be unique, so each
//! `(handler, hook)` pair is advertised as `<handler>-<hook path segment>`
//! (e.g. `docker-cluster-config-generatepatches`). CAPI calls the hook back
//! under that name.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use trellis_common::hooks::{
    DiscoveryResponse, ExtensionHandler, FailurePolicy, GroupVersionHook, Hook,
};
use trellis_common::RUNTIME_HOOKS_API_VERSION;
use trellis_patches::MetaHandler;

use crate::config::MAX_TIMEOUT_SECONDS;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleHandler;

/// Hooks a meta handler answers
pub const PATCH_HOOKS: &[Hook] = &[
    Hook::DiscoverVariables,
    Hook::GeneratePatches,
    Hook::ValidateTopology,
];

/// What serves a registered handler name
#[derive(Clone)]
pub enum HookHandler {
    /// A meta handler serving the topology mutation hooks
    Patches(Arc<MetaHandler>),
    /// A handler for one lifecycle hook
    Lifecycle(Arc<dyn LifecycleHandler>),
}

impl HookHandler {
    /// Hooks this handler serves
    pub fn hooks(&self) -> Vec<Hook> {
        match self {
            Self::Patches(_) => PATCH_HOOKS.to_vec(),
            Self::Lifecycle(handler) => vec![handler.hook()],
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Patches(handler) => handler.name(),
            Self::Lifecycle(handler) => handler.name(),
        }
    }
}

/// Name advertised in discovery, and called back by CAPI, for one hook of a handler
pub fn discovery_name(handler: &str, hook: Hook) -> String {
    format!("{handler}-{}", hook.path_segment())
}

impl fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patches(handler) => f.debug_tuple("Patches").field(&handler.name()).finish(),
            Self::Lifecycle(handler) => f
                .debug_tuple("Lifecycle")
                .field(&handler.name())
                .field(&handler.hook())
                .finish(),
        }
    }
}

/// Registered handlers and the discovery settings advertised for them
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: Vec<HookHandler>,
    timeout_seconds: u32,
    failure_policy: FailurePolicy,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new(timeout_seconds: u32, failure_policy: FailurePolicy) -> Self {
        Self {
            handlers: Vec::new(),
            timeout_seconds,
            failure_policy,
        }
    }

    /// Register a meta handler for the topology mutation hooks
    pub fn register_patches(&mut self, handler: MetaHandler) -> Result<()> {
        self.register(HookHandler::Patches(Arc::new(handler)))
    }

    /// Register a lifecycle handler
    pub fn register_lifecycle(&mut self, handler: Arc<dyn LifecycleHandler>) -> Result<()> {
        self.register(HookHandler::Lifecycle(handler))
    }

    fn register(&mut self, handler: HookHandler) -> Result<()> {
        let name = handler.name().to_string();
        for hook in handler.hooks() {
            if self.get(hook, &discovery_name(&name, hook)).is_some() {
                return Err(Error::Config(format!(
                    "handler {name} registered twice for hook {hook}"
                )));
            }
        }
        info!(handler = %name, hooks = ?handler.hooks(), "registered handler");
        self.handlers.push(handler);
        Ok(())
    }

    /// Whether any handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Find the handler serving `hook` under its advertised `name`
    pub fn get(&self, hook: Hook, name: &str) -> Option<&HookHandler> {
        self.handlers
            .iter()
            .find(|h| h.hooks().contains(&hook) && discovery_name(h.name(), hook) == name)
    }

    /// The meta handler advertised as `name` for `hook`
    pub fn patches(&self, hook: Hook, name: &str) -> Result<Arc<MetaHandler>> {
        match self.get(hook, name) {
            Some(HookHandler::Patches(handler)) => Ok(handler.clone()),
            _ => Err(unknown_handler(hook, name)),
        }
    }

    /// The lifecycle handler advertised as `name` for `hook`
    pub fn lifecycle(&self, hook: Hook, name: &str) -> Result<Arc<dyn LifecycleHandler>> {
        match self.get(hook, name) {
            Some(HookHandler::Lifecycle(handler)) => Ok(handler.clone()),
            _ => Err(unknown_handler(hook, name)),
        }
    }

    /// Answer the discovery call: one uniquely named entry per `(handler, hook)` pair
    pub fn discovery(&self) -> DiscoveryResponse {
        // CAPI rejects anything above the limit; Config::validate refuses it at startup
        let timeout_seconds = self.timeout_seconds.min(MAX_TIMEOUT_SECONDS) as i32;
        let handlers = self
            .handlers
            .iter()
            .flat_map(|handler| {
                handler.hooks().into_iter().map(move |hook| ExtensionHandler {
                    name: discovery_name(handler.name(), hook),
                    request_hook: GroupVersionHook {
                        api_version: RUNTIME_HOOKS_API_VERSION.to_string(),
                        hook: hook.name().to_string(),
                    },
                    timeout_seconds: Some(timeout_seconds),
                    failure_policy: Some(self.failure_policy),
                })
            })
            .collect();
        DiscoveryResponse::new(handlers)
    }
}

fn unknown_handler(hook: Hook, name: &str) -> Error {
    Error::UnknownHandler {
        hook: hook.to_string(),
        handler: name.to_string(),
    }
}
