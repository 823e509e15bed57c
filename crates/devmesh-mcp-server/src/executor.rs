//! Tool Executor (C5, calling half): the seven-step `tools/call`
//! contract.
//!
//! Credential resolution, path templating, and deadline/cancellation are
//! implemented here as a single `call` entry point so the router's
//! handler stays a thin translation from JSON-RPC params to this
//! function's arguments.

use crate::registry::ToolRegistry;
use crate::store::{CredentialStore, StoredCredential, ToolAuthRecipe, ToolConfig};
use devmesh_mcp_protocol::context::RequestContext;
use devmesh_mcp_protocol::error::{Error, ErrorKind};
use devmesh_mcp_protocol::types::{
    CallToolRequest, CallToolResult, CredentialProvenance, PassthroughCredential,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What actually authorized the outbound call, logged but never returned
/// to the client and never persisted when it came from a pass-through.
#[derive(Debug, Clone)]
pub struct ActivationRecord {
    pub tool_name: String,
    pub provenance: CredentialProvenance,
    pub deadline: Duration,
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    credentials: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    default_deadline: Duration,
    max_deadline: Duration,
}

impl ToolExecutor {
    pub fn new(
        registry: ToolRegistry,
        credentials: Arc<dyn CredentialStore>,
        default_deadline: Duration,
        max_deadline: Duration,
    ) -> Self {
        Self {
            registry,
            credentials,
            http: reqwest::Client::new(),
            default_deadline,
            max_deadline,
        }
    }

    pub async fn call(
        &self,
        ctx: &RequestContext,
        request: CallToolRequest,
        cancellation: CancellationToken,
    ) -> Result<CallToolResult, Error> {
        // Step 1: resolve by (tenant_id, name); isolation is a property of
        // this lookup, not a filter applied afterward.
        let config = self
            .registry
            .get(ctx.tenant_id(), &request.name)
            .await
            .ok_or_else(|| Error::not_found(format!("tool '{}'", request.name)))?;

        if request.deadline_ms == Some(0) {
            return Err(Error::invalid_params("deadline must be greater than zero"));
        }

        // Step 2: credential resolution priority — pass-through, then
        // stored, then unauthenticated if the tool allows it.
        let (credential, provenance) = self
            .resolve_credential(ctx.tenant_id(), &request, &config)
            .await?;

        // Step 3: parameter validation against the tool's schema.
        validate_arguments(&config, &request.arguments)?;

        let deadline = self.resolve_deadline(request.deadline_ms, &config);

        // Step 4: select operation and render the path template.
        let operation = config
            .operations
            .iter()
            .find(|op| {
                request
                    .arguments
                    .get("action")
                    .and_then(|v| v.as_str())
                    .map(|action| action == op.action)
                    .unwrap_or_else(|| config.operations.len() == 1)
            })
            .ok_or_else(|| Error::invalid_params("no matching operation for this tool"))?;

        let url = render_path_template(&config.base_url, &operation.path_template, &request.arguments)?;

        let activation = ActivationRecord {
            tool_name: request.name.clone(),
            provenance,
            deadline,
        };
        tracing::info!(
            tool = %activation.tool_name,
            provenance = ?activation.provenance,
            tenant_id = %ctx.tenant_id(),
            "tool call activated"
        );

        // Step 5: execute with a per-call deadline, observing cancellation.
        let mut builder = self
            .http
            .request(method_from_str(&operation.http_method), url)
            .json(&request.arguments);
        builder = attach_credential(builder, credential.as_ref());

        let response = tokio::select! {
            result = builder.send() => result.map_err(|e| upstream_error(&e)),
            _ = cancellation.cancelled() => Err(Error::cancelled()),
            _ = tokio::time::sleep(deadline) => Err(Error::timeout(request.name.clone())),
        }?;

        // Step 6: shape the result or map the failure.
        shape_response(response).await
    }

    async fn resolve_credential(
        &self,
        tenant_id: &str,
        request: &CallToolRequest,
        config: &ToolConfig,
    ) -> Result<(Option<StoredCredential>, CredentialProvenance), Error> {
        if let Some(passthrough) = request.credentials.get(&request.name) {
            return Ok((Some(as_stored(passthrough)), CredentialProvenance::Passthrough));
        }
        if let Some(stored) = self.credentials.resolve(tenant_id, &request.name).await {
            return Ok((Some(stored), CredentialProvenance::Stored));
        }
        if config.allow_unauthenticated {
            Ok((None, CredentialProvenance::None))
        } else {
            Err(Error::unauthorized(format!(
                "tool '{}' requires a credential",
                request.name
            )))
        }
    }

    fn resolve_deadline(&self, requested_ms: Option<u64>, config: &ToolConfig) -> Duration {
        let cap = config.max_call_deadline.unwrap_or(self.max_deadline);
        let requested = requested_ms.map(Duration::from_millis).unwrap_or(self.default_deadline);
        requested.min(cap)
    }
}

fn as_stored(credential: &PassthroughCredential) -> StoredCredential {
    match credential {
        PassthroughCredential::Bearer { token } => StoredCredential {
            kind: ToolAuthRecipe::Bearer,
            token: token.clone(),
            username: None,
        },
        PassthroughCredential::Basic { username, password } => StoredCredential {
            kind: ToolAuthRecipe::Basic,
            token: password.clone(),
            username: Some(username.clone()),
        },
        PassthroughCredential::ApiKey { token } => StoredCredential {
            kind: ToolAuthRecipe::ApiKey,
            token: token.clone(),
            username: None,
        },
    }
}

fn attach_credential(builder: reqwest::RequestBuilder, credential: Option<&StoredCredential>) -> reqwest::RequestBuilder {
    match credential {
        Some(StoredCredential { kind: ToolAuthRecipe::Bearer, token, .. }) => builder.bearer_auth(token),
        Some(StoredCredential { kind: ToolAuthRecipe::Basic, token, username }) => {
            builder.basic_auth(username.clone().unwrap_or_default(), Some(token.clone()))
        }
        Some(StoredCredential { kind: ToolAuthRecipe::ApiKey, token, .. }) => builder.header("X-API-Key", token),
        _ => builder,
    }
}

fn method_from_str(method: &str) -> reqwest::Method {
    reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::GET)
}

fn validate_arguments(
    config: &ToolConfig,
    arguments: &std::collections::HashMap<String, serde_json::Value>,
) -> Result<(), Error> {
    for required in &config.parameter_schema.required {
        if !arguments.contains_key(required) {
            return Err(Error::invalid_params(format!("missing required argument '{required}'")));
        }
    }
    Ok(())
}

/// Substitutes `{name}` placeholders in a path template from `arguments`.
/// Missing placeholders are an `invalid_params` error, not a panic and
/// not a silently empty segment.
fn render_path_template(
    base_url: &str,
    template: &str,
    arguments: &std::collections::HashMap<String, serde_json::Value>,
) -> Result<String, Error> {
    let mut path = template.to_string();
    let mut cursor = 0;
    while let Some(start) = path[cursor..].find('{') {
        let start = cursor + start;
        let Some(end) = path[start..].find('}') else {
            break;
        };
        let end = start + end;
        let name = &path[start + 1..end];
        let value = arguments
            .get(name)
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| Some(v.to_string())))
            .ok_or_else(|| Error::invalid_params(format!("missing path argument '{name}'")))?;
        path.replace_range(start..=end, &value);
        cursor = start + value.len();
    }
    Ok(format!("{}{}", base_url.trim_end_matches('/'), path))
}

fn upstream_error(err: &reqwest::Error) -> Error {
    Error::new(ErrorKind::ToolError, format!("upstream request failed: {err}"))
}

async fn shape_response(response: reqwest::Response) -> Result<CallToolResult, Error> {
    let status = response.status();
    if status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        return Ok(CallToolResult {
            content: vec![devmesh_mcp_protocol::types::ContentBlock::text(body.to_string())],
            is_error: None,
            structured_content: Some(body),
        });
    }

    let redacted = "<redacted upstream body>".to_string();
    if status.is_client_error() {
        Err(Error::new(
            ErrorKind::ToolError,
            format!("upstream returned {status}: {redacted}"),
        ))
    } else {
        Err(Error::new(
            ErrorKind::ToolError,
            format!("upstream returned {status}, retry may succeed: {redacted}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_path_template_substitutes_named_placeholder() {
        let mut args = std::collections::HashMap::new();
        args.insert("id".to_string(), serde_json::json!("repo-42"));
        let rendered = render_path_template("https://api.example.com", "/repos/{id}", &args).unwrap();
        assert_eq!(rendered, "https://api.example.com/repos/repo-42");
    }

    #[test]
    fn render_path_template_rejects_missing_placeholder() {
        let args = std::collections::HashMap::new();
        let err = render_path_template("https://api.example.com", "/repos/{id}", &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParams);
    }

    #[test]
    fn validate_arguments_requires_declared_fields() {
        let mut config = test_config();
        config.parameter_schema.required = vec!["name".to_string()];
        let err = validate_arguments(&config, &std::collections::HashMap::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParams);
    }

    fn test_config() -> ToolConfig {
        ToolConfig {
            tenant_id: "t1".into(),
            name: "demo".into(),
            description: None,
            base_url: "https://example.com".into(),
            auth_recipe: ToolAuthRecipe::None,
            operations: vec![],
            parameter_schema: devmesh_mcp_protocol::types::ParameterSchema::default(),
            enabled: true,
            required_scopes: Default::default(),
            max_call_deadline: None,
            allow_unauthenticated: true,
        }
    }
}
