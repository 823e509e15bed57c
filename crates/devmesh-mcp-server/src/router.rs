//! Method Router (C4): method-name dispatch, draining/initialization
//! gating, and error shaping.

use crate::handlers;
use crate::session::{SessionHandle, SessionState};
use crate::state::AppState;
use devmesh_mcp_protocol::context::{Principal, RequestContext};
use devmesh_mcp_protocol::error::{Error, ErrorKind};
use devmesh_mcp_protocol::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Router {
    state: Arc<AppState>,
}

impl Router {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Dispatches one request and always returns a response — the
    /// bijection invariant (exactly one response per request id) is kept
    /// by the caller never constructing a `JsonRpcResponse` any other way.
    pub async fn dispatch_request(
        &self,
        session: &SessionHandle,
        principal: &Principal,
        request: JsonRpcRequest,
        cancellation: CancellationToken,
    ) -> JsonRpcResponse {
        let id = request.id.clone();
        match self.handle_request(session, principal, &request, cancellation).await {
            Ok(result) => JsonRpcResponse::success(result, id),
            Err(err) => {
                self.state.metrics.error_recorded(kind_label(err.kind));
                crate::logging::log_error(&err);
                JsonRpcResponse::error(err.to_jsonrpc_error(), id)
            }
        }
    }

    async fn handle_request(
        &self,
        session: &SessionHandle,
        principal: &Principal,
        request: &JsonRpcRequest,
        cancellation: CancellationToken,
    ) -> Result<serde_json::Value, Error> {
        if request.method != "initialize" {
            match session.state() {
                SessionState::Connected => {
                    return Err(Error::new(ErrorKind::InvalidRequest, "session is not initialized"));
                }
                SessionState::Draining | SessionState::Closed => {
                    return Err(Error::new(ErrorKind::ShuttingDown, "server is draining"));
                }
                SessionState::Initialized | SessionState::Ready => {}
            }
        }

        if let Err(retry_after) = self.state.rate_limits.check(&principal.principal_id) {
            self.state.metrics.rate_limit_rejected();
            return Err(Error::rate_limited(retry_after.as_millis() as u64));
        }

        self.state.metrics.request_handled();
        let ctx = RequestContext::new(session.id, principal.clone()).for_request(request.id.clone());
        let params = request.params.clone();

        match request.method.as_str() {
            "initialize" => handlers::initialize(session, params).await,
            "ping" => Ok(serde_json::json!({ "pong": true, "ts": chrono::Utc::now().to_rfc3339() })),
            "tools/list" => handlers::list_tools(&self.state, &ctx, params).await,
            "tools/call" => handlers::call_tool(&self.state, &ctx, params, cancellation).await,
            "resources/list" => Ok(handlers::list_resources(&self.state, &ctx)),
            "resources/read" => handlers::read_resource(&self.state, &ctx, params).await,
            "resources/subscribe" => handlers::subscribe(&self.state, session, params),
            "resources/unsubscribe" => handlers::unsubscribe(&self.state, session, params),
            "prompts/list" => Ok(handlers::list_prompts(&self.state)),
            "logging/setLevel" => handlers::set_level(session, params),
            "agent.register" => handlers::agent_register(&self.state, &ctx, params).await,
            "agent.health" => handlers::agent_health(&self.state, params).await,
            "agent.deregister" => handlers::agent_deregister(&self.state, &ctx, params).await,
            "shutdown" => {
                session.set_state(SessionState::Draining);
                Ok(serde_json::json!({}))
            }
            other => Err(Error::new(ErrorKind::MethodNotFound, format!("unknown method '{other}'"))),
        }
    }

    /// Dispatches a notification; produces no response by construction —
    /// there is no code path here that can build a `JsonRpcResponse`.
    pub async fn dispatch_notification(&self, session: &SessionHandle, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" => {
                if session.state() == SessionState::Initialized {
                    session.set_state(SessionState::Ready);
                }
            }
            "$/cancelRequest" => {
                let id = notification
                    .params
                    .as_ref()
                    .and_then(|p| p.get("id"))
                    .and_then(|v| serde_json::from_value::<devmesh_mcp_protocol::jsonrpc::RequestId>(v.clone()).ok());
                if let Some(id) = id {
                    session.cancel_request(&id);
                }
            }
            _ => {}
        }
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ParseError => "parse_error",
        ErrorKind::InvalidRequest => "invalid_request",
        ErrorKind::MethodNotFound => "method_not_found",
        ErrorKind::InvalidParams => "invalid_params",
        ErrorKind::Internal => "internal",
        ErrorKind::Unauthorized => "unauthorized",
        ErrorKind::Forbidden => "forbidden",
        ErrorKind::NotFound => "not_found",
        ErrorKind::RateLimited => "rate_limited",
        ErrorKind::Timeout => "timeout",
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::ToolError => "tool_error",
        ErrorKind::Overloaded => "overloaded",
        ErrorKind::UnsupportedVersion => "unsupported_version",
        ErrorKind::ShuttingDown => "shutting_down",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::Stores;
    use std::collections::HashSet;

    fn router() -> Router {
        Router::new(Arc::new(AppState::new(ServerConfig::default(), Stores::in_memory())))
    }

    fn principal() -> Principal {
        Principal::new("tenant-a", "user-1", HashSet::<String>::new())
    }

    #[tokio::test]
    async fn method_before_initialize_is_rejected() {
        let router = router();
        let (session, _rx) = SessionHandle::new(None);
        let request = JsonRpcRequest::new("ping", None, 1i64);
        let response = router
            .dispatch_request(&session, &principal(), request, CancellationToken::new())
            .await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn initialize_then_ping_succeeds() {
        let router = router();
        let (session, _rx) = SessionHandle::new(None);

        let init_params = serde_json::json!({
            "protocolVersion": "2025-06-18",
            "clientInfo": {"name": "test", "version": "0.1"},
        });
        let init = JsonRpcRequest::new("initialize", Some(init_params), 1i64);
        let init_resp = router
            .dispatch_request(&session, &principal(), init, CancellationToken::new())
            .await;
        assert!(init_resp.is_success());

        router
            .dispatch_notification(&session, JsonRpcNotification::new("initialized", None))
            .await;
        assert_eq!(session.state(), SessionState::Ready);

        let ping = JsonRpcRequest::new("ping", None, 2i64);
        let ping_resp = router
            .dispatch_request(&session, &principal(), ping, CancellationToken::new())
            .await;
        assert!(ping_resp.is_success());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let router = router();
        let (session, _rx) = SessionHandle::new(None);
        session.set_state(SessionState::Ready);
        let request = JsonRpcRequest::new("bogus/method", None, 1i64);
        let response = router
            .dispatch_request(&session, &principal(), request, CancellationToken::new())
            .await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn shutdown_moves_session_into_draining() {
        let router = router();
        let (session, _rx) = SessionHandle::new(None);
        session.set_state(SessionState::Ready);
        let request = JsonRpcRequest::new("shutdown", None, 1i64);
        router
            .dispatch_request(&session, &principal(), request, CancellationToken::new())
            .await;
        assert_eq!(session.state(), SessionState::Draining);
    }
}
