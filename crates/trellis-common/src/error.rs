//! Error types for Trellis
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context a cluster operator needs to fix the
//! configuration: the variable and field path being resolved, the template
//! kind being decoded, or the handler whose mutation failed.
//!
//! "Variable not found" is deliberately absent: an unset variable is a normal
//! condition and is represented as `Ok(None)` by the variable accessor.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Trellis operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A variable value did not match the type expected at its field path
    #[error("variable error for {variable} at [{field_path}]: {message}")]
    Variable {
        /// Name of the cluster variable (e.g., "clusterConfig")
        variable: String,
        /// Dotted field path inside the variable (e.g., "etcd.image")
        field_path: String,
        /// Description of the mismatch
        message: String,
    },

    /// A request object could not be decoded into its registered type
    #[error("decode error for {kind}: {message}")]
    Decode {
        /// Kind of the object being decoded
        kind: String,
        /// Description of what failed
        message: String,
    },

    /// A request object's apiVersion/kind is not in the object registry
    #[error("unregistered object kind {api_version}/{kind}")]
    UnregisteredKind {
        /// apiVersion of the object
        api_version: String,
        /// kind of the object
        kind: String,
    },

    /// A typed mutate function failed
    #[error("mutation error [{handler}]: {message}")]
    Mutation {
        /// Name of the mutator that failed
        handler: String,
        /// Description of what failed
        message: String,
    },

    /// Computing, merging, or applying a JSON Patch failed
    #[error("patch error: {message}")]
    Patch {
        /// Description of what failed
        message: String,
    },

    /// Schema generation failed or a declared field path is not advertised
    #[error("schema error for {variable}: {message}")]
    Schema {
        /// Name of the variable whose schema is affected
        variable: String,
        /// Description of what failed
        message: String,
    },

    /// The caller cancelled the request before processing completed
    #[error("request cancelled: {message}")]
    Cancelled {
        /// Where processing stopped
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Configuration error (startup flags, TLS material)
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is misconfigured
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "server", "lifecycle")
        context: String,
    },
}

impl Error {
    /// Create a variable error for a value at the given field path
    pub fn variable(
        variable: impl Into<String>,
        field_path: &[&str],
        msg: impl Into<String>,
    ) -> Self {
        Self::Variable {
            variable: variable.into(),
            field_path: field_path.join("."),
            message: msg.into(),
        }
    }

    /// Create a decode error for the given object kind
    pub fn decode(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create an error for an apiVersion/kind missing from the object registry
    pub fn unregistered_kind(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnregisteredKind {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Create a mutation error for the named mutator
    pub fn mutation(handler: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Mutation {
            handler: handler.into(),
            message: msg.into(),
        }
    }

    /// Create a patch error with the given message
    pub fn patch(msg: impl Into<String>) -> Self {
        Self::Patch {
            message: msg.into(),
        }
    }

    /// Create a schema error for the given variable
    pub fn schema(variable: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Schema {
            variable: variable.into(),
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration problems (variables, decoding, mutation, schema) need an
    /// operator to fix the cluster spec, so they are not retryable. Kubernetes
    /// errors are retryable unless the API server rejected the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Variable { .. } => false,
            Error::Decode { .. } => false,
            Error::UnregisteredKind { .. } => false,
            Error::Mutation { .. } => false,
            Error::Patch { .. } => false,
            Error::Schema { .. } => false,
            Error::Cancelled { .. } => true,
            Error::Serialization { .. } => false,
            Error::Config { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the variable name if this error is associated with one
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Error::Variable { variable, .. } => Some(variable),
            Error::Schema { variable, .. } => Some(variable),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
