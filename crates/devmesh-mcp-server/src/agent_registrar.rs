//! Agent Registrar (C6): the idempotent three-tier registration contract.
//!
//! The idempotence guarantee is enforced
//! one layer down in `AgentCatalog::upsert_registration` — this module is
//! the orchestration of the four steps, not the guard itself.

use crate::store::AgentCatalog;
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{
    AgentDeregisterRequest, AgentHealth, AgentHealthRequest, RegisterAgentRequest,
    RegisterAgentResult,
};
use serde::Serialize;
use std::sync::Arc;

pub struct AgentRegistrar {
    catalog: Arc<dyn AgentCatalog>,
}

impl AgentRegistrar {
    pub fn new(catalog: Arc<dyn AgentCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn register(
        &self,
        tenant_id: &str,
        request: RegisterAgentRequest,
    ) -> Result<RegisterAgentResult, Error> {
        // Step 1: manifest.
        let (manifest_id, _manifest_is_new) = self.catalog.get_or_create_manifest(&request.agent_id).await;

        // Step 2: configuration.
        let (config_id, _config_is_new) = self
            .catalog
            .upsert_configuration(tenant_id, &request.agent_id, request.runtime_config.clone())
            .await;

        // Step 3 & 4: registration by instance_id, idempotent.
        let (registration, is_new) = self
            .catalog
            .upsert_registration(
                tenant_id,
                &request.agent_id,
                &request.instance_id,
                request.name,
                request.connection_details,
                request.runtime_config,
            )
            .await;

        let message = if is_new {
            "agent instance registered".to_string()
        } else {
            "agent instance registration refreshed".to_string()
        };

        Ok(RegisterAgentResult {
            registration_id: registration.registration_id,
            manifest_id,
            config_id,
            is_new,
            message,
        })
    }

    pub async fn record_health(&self, request: AgentHealthRequest) -> Result<(), Error> {
        let health = match request.health {
            AgentHealth::Healthy => "healthy",
            AgentHealth::Degraded => "degraded",
            AgentHealth::Unhealthy => "unhealthy",
        };
        self.catalog
            .record_health(&request.instance_id, health)
            .await
            .ok_or_else(|| Error::not_found(format!("agent instance '{}'", request.instance_id)))
    }

    pub async fn deregister(&self, request: AgentDeregisterRequest) -> Result<(), Error> {
        self.catalog
            .deregister(&request.instance_id)
            .await
            .ok_or_else(|| Error::not_found(format!("agent instance '{}'", request.instance_id)))
    }

    /// The registration/config/health snapshot behind the
    /// `devmesh://agents/{tenant_id}` resource: every live instance
    /// registered under this tenant, joined with its manifest's
    /// `agent_type`. A tenant with no agents gets an empty list rather
    /// than an error — the resource is readable either way.
    pub async fn snapshot(&self, tenant_id: &str) -> Vec<AgentSnapshot> {
        self.catalog
            .get_registrations(tenant_id)
            .await
            .into_iter()
            .map(|(reg, manifest)| AgentSnapshot {
                agent_id: reg.agent_id,
                instance_id: reg.instance_id,
                agent_type: manifest.agent_type,
                status: reg.status,
                health: reg.health,
                runtime_config: reg.runtime_config.unwrap_or_else(|| serde_json::json!({})),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub instance_id: String,
    pub agent_type: String,
    pub status: String,
    pub health: String,
    pub runtime_config: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAgentCatalog;
    use devmesh_mcp_protocol::types::RegisterAgentRequest;

    fn request(instance_id: &str) -> RegisterAgentRequest {
        RegisterAgentRequest {
            agent_id: "agent-1".to_string(),
            instance_id: instance_id.to_string(),
            name: None,
            connection_details: None,
            runtime_config: None,
        }
    }

    #[tokio::test]
    async fn first_registration_reports_is_new() {
        let registrar = AgentRegistrar::new(Arc::new(InMemoryAgentCatalog::new()));
        let result = registrar.register("t1", request("i1")).await.unwrap();
        assert!(result.is_new);
    }

    #[tokio::test]
    async fn repeated_registration_is_idempotent() {
        let registrar = AgentRegistrar::new(Arc::new(InMemoryAgentCatalog::new()));
        let first = registrar.register("t1", request("i1")).await.unwrap();
        let second = registrar.register("t1", request("i1")).await.unwrap();
        let third = registrar.register("t1", request("i1")).await.unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert!(!third.is_new);
        assert_eq!(first.registration_id, second.registration_id);
        assert_eq!(second.registration_id, third.registration_id);
    }

    #[tokio::test]
    async fn snapshot_reflects_registered_agents_for_tenant_only() {
        let registrar = AgentRegistrar::new(Arc::new(InMemoryAgentCatalog::new()));
        registrar.register("t1", request("i1")).await.unwrap();
        registrar.register("t2", request("i2")).await.unwrap();

        let t1_snapshot = registrar.snapshot("t1").await;
        assert_eq!(t1_snapshot.len(), 1);
        assert_eq!(t1_snapshot[0].instance_id, "i1");
        assert_eq!(t1_snapshot[0].agent_id, "agent-1");
        assert_eq!(t1_snapshot[0].status, "active");

        let empty = registrar.snapshot("no-such-tenant").await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn deregister_unknown_instance_is_not_found() {
        let registrar = AgentRegistrar::new(Arc::new(InMemoryAgentCatalog::new()));
        let err = registrar
            .deregister(AgentDeregisterRequest {
                instance_id: "ghost".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, devmesh_mcp_protocol::error::ErrorKind::NotFound);
    }
}
