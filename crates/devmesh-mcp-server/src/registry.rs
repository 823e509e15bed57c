//! Tool Registry (C5, listing half): turns tenant-scoped `ToolConfig`
//! rows into the wire-level `ToolDescriptor`s `tools/list` returns.
//!
//! The isolation guarantee lives one layer down, in `ToolConfigStore`:
//! every lookup here already takes `tenant_id`, so there is no code path
//! through this module that can see another tenant's row to begin with.

use crate::store::{ToolConfig, ToolConfigStore};
use devmesh_mcp_protocol::types::{ToolDescriptor, ToolOperation};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ToolRegistry {
    store: Arc<dyn ToolConfigStore>,
}

impl ToolRegistry {
    pub fn new(store: Arc<dyn ToolConfigStore>) -> Self {
        Self { store }
    }

    /// Deterministic, sorted by name (the store already sorts; this
    /// keeps that contract visible at the call site rather than implicit).
    pub async fn list(&self, tenant_id: &str, scopes: &HashSet<String>) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .store
            .list(tenant_id, scopes)
            .await
            .into_iter()
            .map(descriptor_from_config)
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub async fn get(&self, tenant_id: &str, name: &str) -> Option<ToolConfig> {
        self.store.get(tenant_id, name).await
    }
}

fn descriptor_from_config(config: ToolConfig) -> ToolDescriptor {
    ToolDescriptor {
        name: config.name,
        description: config.description,
        input_schema: config.parameter_schema,
        operations: config
            .operations
            .into_iter()
            .map(|op| ToolOperation {
                action: op.action,
                http_method: op.http_method,
                path_template: op.path_template,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryToolConfigStore, ToolAuthRecipe};
    use devmesh_mcp_protocol::types::ParameterSchema;

    fn config(tenant_id: &str, name: &str) -> ToolConfig {
        ToolConfig {
            tenant_id: tenant_id.into(),
            name: name.into(),
            description: Some("a tool".into()),
            base_url: "https://example.com".into(),
            auth_recipe: ToolAuthRecipe::None,
            operations: vec![],
            parameter_schema: ParameterSchema::default(),
            enabled: true,
            required_scopes: HashSet::new(),
            max_call_deadline: None,
            allow_unauthenticated: true,
        }
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let store = Arc::new(InMemoryToolConfigStore::new());
        store.insert(config("t1", "zebra"));
        store.insert(config("t1", "apple"));
        let registry = ToolRegistry::new(store);
        let listed = registry.list("t1", &HashSet::new()).await;
        assert_eq!(listed[0].name, "apple");
        assert_eq!(listed[1].name, "zebra");
    }

    #[tokio::test]
    async fn tenant_b_tool_is_invisible_to_tenant_a() {
        let store = Arc::new(InMemoryToolConfigStore::new());
        store.insert(config("tenant-b", "github_repos"));
        let registry = ToolRegistry::new(store);
        assert!(registry.list("tenant-a", &HashSet::new()).await.is_empty());
        assert!(registry.get("tenant-a", "github_repos").await.is_none());
    }
}
