//! Resource & Prompt Providers (C7): built-in `devmesh://` resources,
//! subscriptions, and prompt descriptors.

use crate::agent_registrar::AgentRegistrar;
use crate::metrics::SharedMetrics;
use dashmap::DashMap;
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{
    PromptDescriptor, Resource, ResourceContents, ResourceUpdatedNotification,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// `(session_id, uri)` keyed subscriptions.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: DashMap<(Uuid, String), UnboundedSender<ResourceUpdatedNotification>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: Uuid, uri: String, sender: UnboundedSender<ResourceUpdatedNotification>) {
        self.subscribers.insert((session_id, uri), sender);
    }

    pub fn unsubscribe(&self, session_id: Uuid, uri: &str) {
        self.subscribers.remove(&(session_id, uri.to_string()));
    }

    /// Drops every subscription owned by a session, called on close.
    pub fn unsubscribe_all(&self, session_id: Uuid) {
        self.subscribers.retain(|(sid, _), _| *sid != session_id);
    }

    pub fn notify(&self, uri: &str) {
        for entry in self.subscribers.iter() {
            if entry.key().1 == uri {
                let _ = entry.value().send(ResourceUpdatedNotification { uri: uri.to_string() });
            }
        }
    }

    pub fn is_subscribed(&self, session_id: Uuid, uri: &str) -> bool {
        self.subscribers.contains_key(&(session_id, uri.to_string()))
    }
}

pub struct ResourceProvider {
    registrar: Arc<AgentRegistrar>,
    metrics: SharedMetrics,
    pub subscriptions: SubscriptionRegistry,
}

impl ResourceProvider {
    pub fn new(registrar: Arc<AgentRegistrar>, metrics: SharedMetrics) -> Self {
        Self {
            registrar,
            metrics,
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    pub fn list(&self, tenant_id: &str) -> Vec<Resource> {
        vec![
            Resource {
                uri: "devmesh://system/health".to_string(),
                name: "system-health".to_string(),
                description: Some("Server version, status, and connection counts".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: format!("devmesh://agents/{tenant_id}"),
                name: "tenant-agents".to_string(),
                description: Some("Current agent registration snapshot for this tenant".to_string()),
                mime_type: Some("application/json".to_string()),
            },
        ]
    }

    pub async fn read(&self, tenant_id: &str, uri: &str) -> Result<ResourceContents, Error> {
        if uri == "devmesh://system/health" {
            let body = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "status": "ok",
                "activeConnections": self.metrics.active_connections(),
            });
            return Ok(ResourceContents {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text: body.to_string(),
            });
        }

        if uri == format!("devmesh://agents/{tenant_id}") {
            let snapshot = self.registrar.snapshot(tenant_id).await;
            return Ok(ResourceContents {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text: serde_json::to_string(&snapshot).unwrap_or_default(),
            });
        }

        Err(Error::not_found(format!("resource '{uri}'")))
    }

    pub fn prompts(&self) -> Vec<PromptDescriptor> {
        vec![PromptDescriptor {
            name: "summarize_tool_output".to_string(),
            description: Some("Summarize the structured content of a tool call result".to_string()),
            arguments: vec![],
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAgentCatalog;

    fn provider() -> ResourceProvider {
        let registrar = Arc::new(AgentRegistrar::new(Arc::new(InMemoryAgentCatalog::new())));
        ResourceProvider::new(registrar, crate::metrics::Metrics::new())
    }

    #[tokio::test]
    async fn health_resource_reads_as_json() {
        let provider = provider();
        let contents = provider.read("t1", "devmesh://system/health").await.unwrap();
        assert_eq!(contents.mime_type, "application/json");
        assert!(contents.text.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn unknown_uri_is_not_found() {
        let provider = provider();
        let err = provider.read("t1", "devmesh://nope").await.unwrap_err();
        assert_eq!(err.kind, devmesh_mcp_protocol::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn listed_agents_resource_is_actually_readable() {
        let catalog = Arc::new(InMemoryAgentCatalog::new());
        let registrar = Arc::new(AgentRegistrar::new(catalog));
        registrar
            .register(
                "t1",
                devmesh_mcp_protocol::types::RegisterAgentRequest {
                    agent_id: "agent-1".to_string(),
                    instance_id: "i1".to_string(),
                    name: None,
                    connection_details: None,
                    runtime_config: None,
                },
            )
            .await
            .unwrap();
        let provider = ResourceProvider::new(registrar, crate::metrics::Metrics::new());

        let listed = provider.list("t1");
        let agents_resource = listed.iter().find(|r| r.uri == "devmesh://agents/t1").unwrap();
        let contents = provider.read("t1", &agents_resource.uri).await.unwrap();
        assert!(contents.text.contains("i1"));
        assert!(contents.text.contains("agent-1"));
    }

    #[tokio::test]
    async fn agents_resource_for_other_tenant_is_not_found() {
        let provider = provider();
        let err = provider.read("t1", "devmesh://agents/t2").await.unwrap_err();
        assert_eq!(err.kind, devmesh_mcp_protocol::error::ErrorKind::NotFound);
    }

    #[test]
    fn subscribe_then_unsubscribe_all_clears_session() {
        let registry = SubscriptionRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        registry.subscribe(session_id, "devmesh://system/health".to_string(), tx);
        assert!(registry.is_subscribed(session_id, "devmesh://system/health"));
        registry.unsubscribe_all(session_id);
        assert!(!registry.is_subscribed(session_id, "devmesh://system/health"));
    }
}
