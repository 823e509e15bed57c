//! The authenticated context threaded through a single request.
//!
//! A `RequestContext` only exists after the authenticator has resolved a
//! principal; there is no "anonymous" variant. Handlers read `tenant_id`
//! from here, never from request params — a client cannot override its
//! own tenant by putting one in `params`, because nothing ever looks.

use crate::jsonrpc::RequestId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// The identity resolved by the authenticator for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub tenant_id: String,
    pub principal_id: String,
    pub scopes: Arc<HashSet<String>>,
}

impl Principal {
    pub fn new(
        tenant_id: impl Into<String>,
        principal_id: impl Into<String>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            principal_id: principal_id.into(),
            scopes: Arc::new(scopes.into_iter().collect()),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Per-request context handed to every handler.
///
/// `session_id` and `principal` are stable for the life of the session;
/// `request_id` and `started_at` are fresh for each call. Cloning this is
/// cheap (an `Arc` clone for scopes, a `Uuid` copy, a cheap metadata map
/// clone) because handlers run concurrently and each needs its own copy.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: Uuid,
    pub request_id: Option<RequestId>,
    pub principal: Principal,
    /// Advisory-only telemetry fields: `X-Tenant-ID` header (never
    /// authoritative), `User-Agent`, `X-IDE-Name`, `X-Agent-ID`.
    pub telemetry: Arc<HashMap<String, String>>,
}

impl RequestContext {
    pub fn new(session_id: Uuid, principal: Principal) -> Self {
        Self {
            session_id,
            request_id: None,
            principal,
            telemetry: Arc::new(HashMap::new()),
        }
    }

    pub fn for_request(&self, request_id: RequestId) -> Self {
        let mut ctx = self.clone();
        ctx.request_id = Some(request_id);
        ctx
    }

    pub fn tenant_id(&self) -> &str {
        &self.principal.tenant_id
    }

    pub fn principal_id(&self) -> &str {
        &self.principal.principal_id
    }

    /// Validates that a resource's owning tenant matches this context's
    /// authenticated tenant. Every lookup that crosses a tenant boundary
    /// must go through this, not through a post-hoc filter.
    pub fn owns_tenant(&self, tenant_id: &str) -> bool {
        self.principal.tenant_id == tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tenant: &str) -> RequestContext {
        RequestContext::new(
            Uuid::new_v4(),
            Principal::new(tenant, "user-1", ["tools:call".to_string()]),
        )
    }

    #[test]
    fn owns_tenant_rejects_foreign_tenant() {
        let ctx = ctx("tenant-a");
        assert!(ctx.owns_tenant("tenant-a"));
        assert!(!ctx.owns_tenant("tenant-b"));
    }

    #[test]
    fn for_request_preserves_principal_and_sets_request_id() {
        let base = ctx("tenant-a");
        let scoped = base.for_request(RequestId::Number(7));
        assert_eq!(scoped.tenant_id(), "tenant-a");
        assert_eq!(scoped.request_id, Some(RequestId::Number(7)));
    }

    #[test]
    fn has_scope_checks_the_resolved_scope_set() {
        let ctx = ctx("tenant-a");
        assert!(ctx.principal.has_scope("tools:call"));
        assert!(!ctx.principal.has_scope("admin"));
    }
}
