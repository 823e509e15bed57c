//! Core types shared across the initialize handshake and the content model.

use super::capabilities::{ClientCapabilities, ServerCapabilities};
use serde::{Deserialize, Serialize};

/// Cursor for paginated list results. Opaque to clients.
pub type Cursor = String;

/// Implementation identity exchanged during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
}

/// Text content block. Plain text is the only content kind in play here;
/// a single-variant enum keeps the door open without modeling image or
/// audio blocks nobody asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}
