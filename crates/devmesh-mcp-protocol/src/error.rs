//! The server's closed error taxonomy and its mapping onto JSON-RPC codes.
//!
//! Every error a handler can produce is one of these kinds. There is no
//! catch-all `Other`: an unexpected failure is `Internal`, not a new
//! variant invented at the call site. Each error carries a correlation id
//! so a support engineer can find it in the logs from the message a
//! client sees.

use crate::jsonrpc::JsonRpcError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Named error kinds, mapped 1:1 onto the codes in `ErrorKind::code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed JSON on the wire.
    #[error("parse error")]
    ParseError,
    /// Well-formed JSON that isn't a valid JSON-RPC envelope, or a
    /// duplicate request id within a session.
    #[error("invalid request")]
    InvalidRequest,
    /// No handler registered for the method name.
    #[error("method not found")]
    MethodNotFound,
    /// `params` failed schema validation for the matched handler.
    #[error("invalid params")]
    InvalidParams,
    /// Handler panicked or returned an error with no named kind.
    #[error("internal error")]
    Internal,
    /// No credential, or the credential didn't resolve to a principal.
    #[error("unauthorized")]
    Unauthorized,
    /// Principal resolved but lacks the scope the operation requires.
    #[error("forbidden")]
    Forbidden,
    /// Resource/tool/prompt doesn't exist, *or* belongs to another tenant.
    #[error("not found")]
    NotFound,
    /// Principal's rate bucket is exhausted.
    #[error("rate limited")]
    RateLimited,
    /// A call exceeded its deadline.
    #[error("timed out")]
    Timeout,
    /// Handler unwound in response to `$/cancelRequest` or session close.
    #[error("cancelled")]
    Cancelled,
    /// The tool executed but the upstream call failed.
    #[error("tool error")]
    ToolError,
    /// Outbound queue high-water mark exceeded; session is being closed.
    #[error("overloaded")]
    Overloaded,
    /// `initialize` requested a protocol version we don't speak.
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    /// Server is draining; new requests are refused.
    #[error("shutting down")]
    ShuttingDown,
}

impl ErrorKind {
    /// The JSON-RPC error code for this kind. The five standard codes are
    /// fixed by the JSON-RPC 2.0 spec; everything else lives in the
    /// `-32000..-32099` application range reserved for implementations.
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::Unauthorized => -32000,
            Self::NotFound => -32001,
            Self::Forbidden => -32002,
            Self::ToolError => -32003,
            Self::RateLimited => -32004,
            Self::UnsupportedVersion => -32005,
            Self::ShuttingDown => -32006,
            Self::Overloaded => -32007,
            Self::Cancelled => -32008,
            Self::Timeout => -32009,
        }
    }

    /// Whether the transport should close the session after this error is
    /// sent, independent of whether a response could even be formed.
    pub const fn closes_session(self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::ParseError | Self::Overloaded
        )
    }
}

/// Contextual metadata attached to an error, redacted of any credential
/// material before it ever reaches a log line or a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub session_id: Option<String>,
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The error type every handler returns. `kind` decides the JSON-RPC code;
/// `id` is the correlation id logged alongside the full (unredacted, for
/// operators only) cause and surfaced to the client in `error.data.id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub context: ErrorContext,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.id, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.context.session_id = Some(session_id.into());
        self
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, resource)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, "deadline exceeded").with_operation(operation)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        let mut err = Self::new(ErrorKind::RateLimited, "rate limit exceeded");
        err.context.retry_after_ms = Some(retry_after_ms);
        err
    }

    /// Shape this error for the wire. Everything in `context.metadata` is
    /// assumed pre-redacted by the caller; this never includes `message`
    /// verbatim for `Internal` errors, only the correlation id, so a bug
    /// in a handler can't leak an internal detail to a tenant.
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let message = match self.kind {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.message.clone(),
        };
        let mut data = serde_json::json!({ "id": self.id });
        if let Some(retry_after_ms) = self.context.retry_after_ms {
            data["retryAfterMs"] = serde_json::json!(retry_after_ms);
        }
        JsonRpcError {
            code: self.kind.code(),
            message,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_expected_code() {
        assert_eq!(ErrorKind::NotFound.code(), -32001);
    }

    #[test]
    fn cancelled_maps_to_expected_code() {
        assert_eq!(ErrorKind::Cancelled.code(), -32008);
    }

    #[test]
    fn invalid_request_maps_to_standard_jsonrpc_code() {
        assert_eq!(ErrorKind::InvalidRequest.code(), -32600);
    }

    #[test]
    fn internal_error_hides_message_on_the_wire() {
        let err = Error::internal("leaked the database password");
        let wire = err.to_jsonrpc_error();
        assert_eq!(wire.message, "internal error");
        assert_eq!(wire.code, -32603);
    }

    #[test]
    fn rate_limited_carries_retry_hint() {
        let err = Error::rate_limited(1500);
        let wire = err.to_jsonrpc_error();
        assert_eq!(wire.data.unwrap()["retryAfterMs"], 1500);
    }

    #[test]
    fn every_error_carries_a_distinct_correlation_id() {
        let a = Error::not_found("tool");
        let b = Error::not_found("tool");
        assert_ne!(a.id, b.id);
    }
}
