//! Session (C2): per-connection state machine, request/response
//! correlation, and cancellation.
//!
//! Session state is owned exclusively by the session's own task; nothing
//! else mutates it directly. What other tasks need — the send lock, the
//! cancellation map, the current log level — is reached through cheap
//! `Arc`/`DashMap` handles so a spawned per-request task can still
//! observe cancellation and write its response without holding a
//! reference to the session object itself.

use dashmap::DashMap;
use devmesh_mcp_protocol::context::Principal;
use devmesh_mcp_protocol::jsonrpc::RequestId;
use devmesh_mcp_protocol::types::{LogLevel, ResourceUpdatedNotification};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The session state machine, collapsed to the states a handler or
/// the transport loop needs to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Initialized,
    Ready,
    Draining,
    Closed,
}

/// Handle shared between the session task and every per-request task it
/// spawns. Cloning is cheap: every field is an `Arc` or a `Copy` type.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub peer_addr: Option<SocketAddr>,
    pub created_at: Instant,
    state: Arc<parking_lot::RwLock<SessionState>>,
    draining_since: Arc<parking_lot::RwLock<Option<Instant>>>,
    principal: Arc<parking_lot::RwLock<Option<Principal>>>,
    protocol_version: Arc<parking_lot::RwLock<Option<String>>>,
    log_level: Arc<parking_lot::RwLock<LogLevel>>,
    in_flight: Arc<DashMap<RequestId, CancellationToken>>,
    seen_ids: Arc<DashMap<RequestId, ()>>,
    /// Serializes outbound frame writes; held only for the duration of a
    /// single write, never across a suspension point inside handler logic.
    pub send_lock: Arc<AsyncMutex<()>>,
    /// Resource-subscription notifications land here; the transport task
    /// owns the matching receiver and folds them into the outbound stream
    /// alongside responses, through the same send lock.
    pub notify_tx: UnboundedSender<ResourceUpdatedNotification>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Returns the handle plus the receiving end of its notification
    /// channel; the caller (the transport task) owns the receiver for the
    /// lifetime of the connection.
    pub fn new(peer_addr: Option<SocketAddr>) -> (Self, UnboundedReceiver<ResourceUpdatedNotification>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            peer_addr,
            created_at: Instant::now(),
            state: Arc::new(parking_lot::RwLock::new(SessionState::Connected)),
            draining_since: Arc::new(parking_lot::RwLock::new(None)),
            principal: Arc::new(parking_lot::RwLock::new(None)),
            protocol_version: Arc::new(parking_lot::RwLock::new(None)),
            log_level: Arc::new(parking_lot::RwLock::new(LogLevel::Info)),
            in_flight: Arc::new(DashMap::new()),
            seen_ids: Arc::new(DashMap::new()),
            send_lock: Arc::new(AsyncMutex::new(())),
            notify_tx,
            closed: Arc::new(AtomicBool::new(false)),
        };
        (handle, notify_rx)
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        if state == SessionState::Draining && *self.state.read() != SessionState::Draining {
            *self.draining_since.write() = Some(Instant::now());
        }
        *self.state.write() = state;
    }

    /// How long this session has been `Draining`, if it is. Backs the
    /// drain-deadline race in the transport loop.
    pub fn draining_elapsed(&self) -> Option<std::time::Duration> {
        self.draining_since.read().map(|since| since.elapsed())
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    pub fn set_principal(&self, principal: Principal) {
        *self.principal.write() = Some(principal);
    }

    pub fn protocol_version(&self) -> Option<String> {
        self.protocol_version.read().clone()
    }

    pub fn set_protocol_version(&self, version: impl Into<String>) {
        *self.protocol_version.write() = Some(version.into());
    }

    pub fn log_level(&self) -> LogLevel {
        *self.log_level.read()
    }

    pub fn set_log_level(&self, level: LogLevel) {
        *self.log_level.write() = level;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }
        self.in_flight.clear();
    }

    /// Registers a fresh in-flight request. `false` means this id is
    /// already in flight on this session (duplicate id).
    pub fn begin_request(&self, id: RequestId) -> Option<CancellationToken> {
        if self.seen_ids.contains_key(&id) {
            return None;
        }
        self.seen_ids.insert(id.clone(), ());
        let token = CancellationToken::new();
        self.in_flight.insert(id, token.clone());
        Some(token)
    }

    pub fn end_request(&self, id: &RequestId) {
        self.in_flight.remove(id);
    }

    /// Signals cancellation for `$/cancelRequest {id}`. No-op if the id
    /// isn't (or is no longer) in flight.
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        if let Some((_, token)) = self.in_flight.remove(id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_request_id_is_rejected() {
        let (session, _rx) = SessionHandle::new(None);
        assert!(session.begin_request(RequestId::Number(9)).is_some());
        assert!(session.begin_request(RequestId::Number(9)).is_none());
    }

    #[test]
    fn cancel_request_cancels_the_token() {
        let (session, _rx) = SessionHandle::new(None);
        let token = session.begin_request(RequestId::Number(7)).unwrap();
        assert!(session.cancel_request(&RequestId::Number(7)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_unknown_id_is_a_no_op() {
        let (session, _rx) = SessionHandle::new(None);
        assert!(!session.cancel_request(&RequestId::Number(1)));
    }

    #[test]
    fn closing_cancels_all_in_flight_requests() {
        let (session, _rx) = SessionHandle::new(None);
        let t1 = session.begin_request(RequestId::Number(1)).unwrap();
        let t2 = session.begin_request(RequestId::Number(2)).unwrap();
        session.mark_closed();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        assert_eq!(session.in_flight_count(), 0);
    }
}
