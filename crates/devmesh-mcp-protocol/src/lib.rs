//! Wire types for the DevMesh MCP protocol core.
//!
//! This crate holds everything that is shared between the transport, the
//! method router, and every handler: the JSON-RPC 2.0 envelope, the MCP
//! method payloads (tools, resources, prompts, agents), the request
//! context that carries authenticated identity through a call, and the
//! error taxonomy with its mapping onto JSON-RPC error codes.
//!
//! Nothing in this crate talks to a socket, a database, or a clock beyond
//! `chrono::Utc::now`. It is pure data plus the serialization contract.

pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod types;

pub use context::RequestContext;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload, JsonRpcVersion, RequestId, ResponseId,
};

/// Protocol versions this server understands, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05"];

/// Prelude for handler and transport code that touches most of this crate.
pub mod prelude {
    pub use crate::context::RequestContext;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
    pub use crate::types::*;
}
