//! Tool descriptors and the `tools/list` / `tools/call` payloads.
//!
//! Unlike a statically-registered tool built by a macro, this descriptor
//! is produced on every `tools/list` from a tenant-scoped row in the
//! tool-configuration store; nothing here is ever constructed at compile
//! time.

use super::core::ContentBlock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A JSON-Schema-like parameter schema. We don't interpret `$ref`/`allOf`
/// etc; validation walks `required` and `properties` by name and checks
/// the declared JSON type, which is all the tool-configuration store's
/// schemas use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

/// One named operation a tool supports (method + path template).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOperation {
    pub action: String,
    pub http_method: String,
    pub path_template: String,
}

/// What `tools/list` returns for one tool, rendered fresh from the
/// tenant's `ToolConfig` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: ParameterSchema,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub operations: Vec<ToolOperation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListToolsRequest {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// Inline credential supplied on a single call; never persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PassthroughCredential {
    Bearer { token: String },
    Basic { username: String, password: String },
    ApiKey { token: String },
}

impl PassthroughCredential {
    /// Name of the variant, for activation-log provenance without ever
    /// logging the secret material itself.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::ApiKey { .. } => "api_key",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub credentials: HashMap<String, PassthroughCredential>,
    /// Per-call deadline override in milliseconds; `0` is rejected as
    /// `invalid_params`, absent falls back to the tool's configured
    /// default.
    #[serde(rename = "deadlineMs", default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: None,
            structured_content: None,
        }
    }
}

/// Where the credential actually materializing a call came from. Recorded
/// on the activation record, never on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialProvenance {
    Passthrough,
    Stored,
    None,
}
