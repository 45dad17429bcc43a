//! HTTP error type for the extension server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors answered with a non-200 status instead of a hook response
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path names a hook this extension does not know
    #[error("unknown hook: {0}")]
    UnknownHook(String),

    /// No handler with this name serves the hook
    #[error("no handler {handler} for hook {hook}")]
    UnknownHandler {
        /// Hook from the request path
        hook: String,
        /// Handler name from the request path
        handler: String,
    },

    /// The request body is not a valid hook request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Configuration error (flags, TLS material, handler registration)
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, reason) = match &self {
            Error::UnknownHook(_) | Error::UnknownHandler { .. } => {
                (StatusCode::NOT_FOUND, "NotFound")
            }
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            Error::Config(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        };

        // K8s-style Status response
        let body = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": self.to_string(),
            "reason": reason,
            "code": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<trellis_common::Error> for Error {
    fn from(e: trellis_common::Error) -> Self {
        match e {
            trellis_common::Error::Config { message } => Error::Config(message),
            other => Error::Internal(other.to_string()),
        }
    }
}
