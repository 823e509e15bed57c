//! JSON-RPC 2.0 envelope types.
//!
//! The wire format is exactly JSON-RPC 2.0: a request carries `id`, a
//! notification omits it. We model that as two distinct Rust types rather
//! than one type with an `Option<RequestId>` field, because the
//! server-side handling genuinely diverges (a notification never produces
//! a response) and keeping that in the type system means a handler can't
//! accidentally reply to one.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The literal string `"2.0"`, enforced on both serialize and deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

const VERSION: &str = "2.0";

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version '{s}', expected '2.0'"
            )))
        }
    }
}

/// Request identifier: a JSON string or number, never null, never an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A JSON-RPC request: has an `id`, always produces exactly one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// A JSON-RPC notification: no `id`, never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// Either shape a client frame may take. We try `JsonRpcRequest` first and
/// fall back to `JsonRpcNotification` so a missing `id` isn't a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    pub fn method(&self) -> &str {
        match self {
            Self::Request(r) => &r.method,
            Self::Notification(n) => &n.method,
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            Self::Request(r) => r.params.as_ref(),
            Self::Notification(n) => n.params.as_ref(),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Notification(_) => None,
        }
    }
}

/// `id` on a response: `None` only for a parse error, where no request
/// could be correlated at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    pub fn null() -> Self {
        Self(None)
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Either shape a response payload may take; `#[serde(flatten)]` onto
/// `JsonRpcResponse` so the wire form has `result` xor `error`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    pub id: ResponseId,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from_request(id),
        }
    }

    pub fn error(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::from_request(id),
        }
    }

    /// A response with no correlated request, used only for parse errors.
    pub fn error_without_id(error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::null(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.id.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_with_numeric_id() {
        let req = JsonRpcRequest::new("ping", None, 7i64);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","method":"ping","id":7}"#);
        let back: JsonRpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, RequestId::Number(7));
    }

    #[test]
    fn notification_has_no_id_field() {
        let note = JsonRpcNotification::new("initialized", None);
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn message_falls_back_to_notification_when_id_missing() {
        let raw = r#"{"jsonrpc":"2.0","method":"$/cancelRequest","params":{"id":7}}"#;
        let msg: JsonRpcMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
        assert!(msg.id().is_none());
    }

    #[test]
    fn message_parses_as_request_when_id_present() {
        let raw = r#"{"jsonrpc":"2.0","method":"ping","id":"abc"}"#;
        let msg: JsonRpcMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));
        assert_eq!(msg.id(), Some(&RequestId::String("abc".into())));
    }

    #[test]
    fn rejects_wrong_version() {
        let raw = r#"{"jsonrpc":"1.0","method":"ping","id":1}"#;
        let err = serde_json::from_str::<JsonRpcRequest>(raw).unwrap_err();
        assert!(err.to_string().contains("unsupported jsonrpc version"));
    }

    #[test]
    fn error_response_serializes_without_result() {
        let resp = JsonRpcResponse::error(
            JsonRpcError {
                code: -32001,
                message: "not_found".into(),
                data: None,
            },
            RequestId::Number(1),
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("result").is_none());
    }

    #[test]
    fn parse_error_response_has_null_id() {
        let resp = JsonRpcResponse::error_without_id(JsonRpcError {
            code: -32700,
            message: "parse error".into(),
            data: None,
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], Value::Null);
    }
}
