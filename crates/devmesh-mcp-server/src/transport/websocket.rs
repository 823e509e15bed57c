//! WebSocket upgrade handler and the per-connection read/write loop.
//!
//! One task owns the actual socket send half; every other task (the main
//! read loop, each spawned per-request task, the subscription forwarder)
//! reaches it only through a bounded `mpsc::Sender<Message>`. That bound
//! *is* the outbound high-water mark: a full channel means the
//! session is overloaded and gets torn down rather than buffered without
//! limit.

use crate::auth::{AuthError, Authenticator};
use crate::router::Router;
use crate::session::{SessionHandle, SessionState};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use devmesh_mcp_protocol::context::Principal;
use devmesh_mcp_protocol::error::{Error, ErrorKind};
use devmesh_mcp_protocol::jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcResponse};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct SharedState {
    app: Arc<AppState>,
    auth: Arc<Authenticator>,
}

pub fn build_app(app: Arc<AppState>, auth: Arc<Authenticator>) -> axum::Router {
    axum::Router::new()
        .route("/mcp", get(upgrade))
        .with_state(SharedState { app, auth })
}

pub async fn serve(app: axum::Router, listen_addr: &str) -> crate::error::ServerResult<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(listen_addr, "accepting MCP WebSocket connections");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.ok() };
    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(shared): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&shared.app.config.origin_allowlist, &headers) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let principal = match shared.auth.authenticate_headers(&headers).await {
        Ok(principal) => principal,
        Err(err) => return unauthorized_response(err),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, shared.app, principal, Some(peer)))
}

fn origin_allowed(allowlist: &[String], headers: &HeaderMap) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|origin| allowlist.iter().any(|allowed| allowed == origin))
        .unwrap_or(false)
}

fn unauthorized_response(err: AuthError) -> Response {
    let body = serde_json::to_string(&JsonRpcResponse::error_without_id(JsonRpcError {
        code: ErrorKind::Unauthorized.code(),
        message: err.to_string(),
        data: None,
    }))
    .unwrap_or_default();
    (StatusCode::UNAUTHORIZED, body).into_response()
}

async fn handle_socket(socket: WebSocket, app: Arc<AppState>, principal: Principal, peer: Option<SocketAddr>) {
    app.metrics.connection_opened();
    let (mut sink, mut stream) = socket.split();
    let (session, mut notify_rx) = SessionHandle::new(peer);
    let router = Arc::new(Router::new(app.clone()));
    let session_cancel = CancellationToken::new();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(app.config.outbound_queue_depth);
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut ping_ticker = tokio::time::interval(app.config.ping_interval());
    ping_ticker.tick().await; // first tick fires immediately; skip it
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = session_cancel.cancelled() => break,
            _ = drain_deadline_elapsed(&session, app.config.drain_deadline()) => {
                tracing::warn!(session_id = %session.id, "drain deadline exceeded, closing session");
                break;
            }
            _ = ping_ticker.tick() => {
                if last_pong.elapsed() > app.config.pong_timeout() {
                    tracing::warn!(session_id = %session.id, "pong timeout, closing session");
                    break;
                }
                if outbound_tx.try_send(Message::Ping(Vec::new().into())).is_err() {
                    break;
                }
            }
            note = notify_rx.recv() => {
                let Some(note) = note else { continue };
                let frame = devmesh_mcp_protocol::jsonrpc::JsonRpcNotification::new(
                    "resources/updated",
                    Some(serde_json::to_value(&note).unwrap_or_default()),
                );
                send_frame(&outbound_tx, &session_cancel, &frame);
            }
            incoming = stream.next() => {
                let Some(incoming) = incoming else { break };
                match incoming {
                    Ok(Message::Text(text)) => {
                        let text: &str = text.as_ref();
                        if text.len() > app.config.max_frame_bytes {
                            let err = Error::new(ErrorKind::InvalidRequest, "frame exceeds max size");
                            send_frame(&outbound_tx, &session_cancel, &JsonRpcResponse::error_without_id(err.to_jsonrpc_error()));
                            break;
                        }
                        handle_text(
                            text,
                            &router,
                            &session,
                            &principal,
                            &outbound_tx,
                            &session_cancel,
                            app.config.inbound_queue_depth,
                        );
                    }
                    Ok(Message::Pong(_)) => last_pong = Instant::now(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(session_id = %session.id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    session.mark_closed();
    drop(outbound_tx);
    let _ = writer.await;
    app.metrics.connection_closed();
    tracing::info!(session_id = %session.id, "session closed");
}

/// Resolves once a `Draining` session has held that state past its
/// deadline; stays pending forever otherwise, so racing it in a
/// `tokio::select!` loop is a no-op until draining actually starts — the
/// same deadline-race shape `ToolExecutor::call` uses for a call timeout.
async fn drain_deadline_elapsed(session: &SessionHandle, deadline: std::time::Duration) {
    match session.draining_elapsed() {
        Some(elapsed) => tokio::time::sleep(deadline.saturating_sub(elapsed)).await,
        None => std::future::pending::<()>().await,
    }
}

fn handle_text(
    text: &str,
    router: &Arc<Router>,
    session: &SessionHandle,
    principal: &Principal,
    outbound_tx: &mpsc::Sender<Message>,
    session_cancel: &CancellationToken,
    inbound_queue_depth: usize,
) {
    let message: JsonRpcMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let err = Error::new(ErrorKind::ParseError, e.to_string());
            send_frame(outbound_tx, session_cancel, &JsonRpcResponse::error_without_id(err.to_jsonrpc_error()));
            return;
        }
    };

    match message {
        JsonRpcMessage::Notification(notification) => {
            let router = router.clone();
            let session = session.clone();
            tokio::spawn(async move {
                router.dispatch_notification(&session, notification).await;
            });
        }
        JsonRpcMessage::Request(request) => {
            let Some(cancellation) = session.begin_request(request.id.clone()) else {
                let err = Error::new(ErrorKind::InvalidRequest, "duplicate request id");
                send_frame(outbound_tx, session_cancel, &JsonRpcResponse::error(err.to_jsonrpc_error(), request.id));
                return;
            };
            if session.in_flight_count() > inbound_queue_depth {
                session.end_request(&request.id);
                let err = Error::new(ErrorKind::Overloaded, "too many in-flight requests");
                send_frame(outbound_tx, session_cancel, &JsonRpcResponse::error(err.to_jsonrpc_error(), request.id));
                session_cancel.cancel();
                return;
            }

            let router = router.clone();
            let session = session.clone();
            let principal = principal.clone();
            let outbound_tx = outbound_tx.clone();
            let session_cancel = session_cancel.clone();
            tokio::spawn(async move {
                let id = request.id.clone();
                let response = router.dispatch_request(&session, &principal, request, cancellation).await;
                session.end_request(&id);
                send_frame(&outbound_tx, &session_cancel, &response);
                if session.state() == SessionState::Draining && session.in_flight_count() == 0 {
                    session_cancel.cancel();
                }
            });
        }
    }
}

fn send_frame<T: serde::Serialize>(outbound_tx: &mpsc::Sender<Message>, session_cancel: &CancellationToken, frame: &T) {
    let Ok(text) = serde_json::to_string(frame) else { return };
    if outbound_tx.try_send(Message::Text(text.into())).is_err() {
        session_cancel.cancel();
    }
}
