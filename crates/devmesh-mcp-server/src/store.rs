//! Collaborator interfaces the core consumes: `KeyStore`,
//! `ToolConfigStore`, `CredentialStore`, `AgentCatalog`. Each is an
//! `async_trait` so a real deployment can swap in a Postgres- or
//! Vault-backed implementation without touching a handler.
//!
//! This crate ships one `InMemory*` implementation of each, which is a
//! legitimate single-process deployment mode, not a test double: the
//! same trait object is handed to the router in both production and
//! tests.

use async_trait::async_trait;
use dashmap::DashMap;
use devmesh_mcp_protocol::types::ParameterSchema;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// What a successful key lookup resolves to.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub tenant_id: String,
    pub principal_id: String,
    pub scopes: HashSet<String>,
    pub rate_limit_per_period: Option<u32>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub revoked: bool,
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// `hash` is the salted hash of the bearer token or API key, never
    /// the raw credential.
    async fn lookup(&self, hash: &str) -> Option<KeyRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAuthRecipe {
    Bearer,
    Basic,
    ApiKey,
    None,
}

#[derive(Debug, Clone)]
pub struct ToolOperationConfig {
    pub action: String,
    pub http_method: String,
    pub path_template: String,
}

/// `(tenant_id, name)`-unique tool configuration.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub auth_recipe: ToolAuthRecipe,
    pub operations: Vec<ToolOperationConfig>,
    pub parameter_schema: ParameterSchema,
    pub enabled: bool,
    pub required_scopes: HashSet<String>,
    pub max_call_deadline: Option<Duration>,
    pub allow_unauthenticated: bool,
}

#[async_trait]
pub trait ToolConfigStore: Send + Sync {
    /// Enablement and scope filtering happen here, inside the lookup, not
    /// as a filter bolted on after the fact — tenant scoping is a
    /// property of this query, not of calling code.
    async fn list(&self, tenant_id: &str, scopes: &HashSet<String>) -> Vec<ToolConfig>;

    async fn get(&self, tenant_id: &str, name: &str) -> Option<ToolConfig>;
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub kind: ToolAuthRecipe,
    pub token: String,
    pub username: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn resolve(&self, tenant_id: &str, tool_name: &str) -> Option<StoredCredential>;
}

#[derive(Debug, Clone)]
pub struct AgentManifest {
    pub agent_id: String,
    pub agent_type: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct AgentConfiguration {
    pub tenant_id: String,
    pub agent_id: String,
    pub runtime_config: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub registration_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub instance_id: String,
    pub name: Option<String>,
    pub connection_details: Option<serde_json::Value>,
    pub runtime_config: Option<serde_json::Value>,
    pub status: String,
    pub health: String,
}

#[async_trait]
pub trait AgentCatalog: Send + Sync {
    /// Returns `(manifest_id, is_new)`. `manifest_id` equals `agent_id`
    /// in this implementation; kept as a distinct return for stores that
    /// mint a surrogate key.
    async fn get_or_create_manifest(&self, agent_id: &str) -> (String, bool);

    /// Returns `(config_id, is_new)`; updates `runtime_config` in place
    /// when one is supplied and a row already exists.
    async fn upsert_configuration(
        &self,
        tenant_id: &str,
        agent_id: &str,
        runtime_config: Option<serde_json::Value>,
    ) -> (String, bool);

    /// The one operation that must be exactly-once-per-`instance_id`
    /// under concurrency: returns the existing or newly created
    /// registration and whether this call created it.
    async fn upsert_registration(
        &self,
        tenant_id: &str,
        agent_id: &str,
        instance_id: &str,
        name: Option<String>,
        connection_details: Option<serde_json::Value>,
        runtime_config: Option<serde_json::Value>,
    ) -> (AgentRegistration, bool);

    async fn record_health(&self, instance_id: &str, health: &str) -> Option<()>;

    async fn deregister(&self, instance_id: &str) -> Option<()>;

    /// Every live registration for a tenant, joined with its manifest's
    /// `agent_type`. Backs the `devmesh://agents/{tenant_id}` resource —
    /// an empty tenant returns an empty list, not `None`.
    async fn get_registrations(&self, tenant_id: &str) -> Vec<(AgentRegistration, AgentManifest)>;
}

// ---------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryKeyStore {
    records: DashMap<String, KeyRecord>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, hash: impl Into<String>, record: KeyRecord) {
        self.records.insert(hash.into(), record);
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn lookup(&self, hash: &str) -> Option<KeyRecord> {
        self.records.get(hash).map(|r| r.clone())
    }
}

#[derive(Default)]
pub struct InMemoryToolConfigStore {
    configs: DashMap<(String, String), ToolConfig>,
}

impl InMemoryToolConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: ToolConfig) {
        self.configs
            .insert((config.tenant_id.clone(), config.name.clone()), config);
    }
}

#[async_trait]
impl ToolConfigStore for InMemoryToolConfigStore {
    async fn list(&self, tenant_id: &str, scopes: &HashSet<String>) -> Vec<ToolConfig> {
        let mut out: Vec<ToolConfig> = self
            .configs
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .map(|entry| entry.value().clone())
            .filter(|cfg| cfg.enabled)
            .filter(|cfg| cfg.required_scopes.is_subset(scopes))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    async fn get(&self, tenant_id: &str, name: &str) -> Option<ToolConfig> {
        self.configs
            .get(&(tenant_id.to_string(), name.to_string()))
            .map(|r| r.clone())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: DashMap<(String, String), StoredCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: impl Into<String>, tool_name: impl Into<String>, cred: StoredCredential) {
        self.credentials.insert((tenant_id.into(), tool_name.into()), cred);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn resolve(&self, tenant_id: &str, tool_name: &str) -> Option<StoredCredential> {
        self.credentials
            .get(&(tenant_id.to_string(), tool_name.to_string()))
            .map(|r| r.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAgentCatalog {
    manifests: DashMap<String, AgentManifest>,
    configurations: DashMap<(String, String), AgentConfiguration>,
    registrations: DashMap<String, AgentRegistration>,
}

impl InMemoryAgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentCatalog for InMemoryAgentCatalog {
    async fn get_or_create_manifest(&self, agent_id: &str) -> (String, bool) {
        let mut created = false;
        self.manifests.entry(agent_id.to_string()).or_insert_with(|| {
            created = true;
            AgentManifest {
                agent_id: agent_id.to_string(),
                agent_type: "standard".to_string(),
                status: "active".to_string(),
            }
        });
        (agent_id.to_string(), created)
    }

    async fn upsert_configuration(
        &self,
        tenant_id: &str,
        agent_id: &str,
        runtime_config: Option<serde_json::Value>,
    ) -> (String, bool) {
        let key = (tenant_id.to_string(), agent_id.to_string());
        let config_id = format!("{tenant_id}:{agent_id}");
        let mut created = false;
        self.configurations
            .entry(key)
            .and_modify(|cfg| {
                if let Some(rc) = runtime_config.clone() {
                    cfg.runtime_config = rc;
                }
            })
            .or_insert_with(|| {
                created = true;
                AgentConfiguration {
                    tenant_id: tenant_id.to_string(),
                    agent_id: agent_id.to_string(),
                    runtime_config: runtime_config.unwrap_or_else(|| serde_json::json!({})),
                }
            });
        (config_id, created)
    }

    async fn upsert_registration(
        &self,
        tenant_id: &str,
        agent_id: &str,
        instance_id: &str,
        name: Option<String>,
        connection_details: Option<serde_json::Value>,
        runtime_config: Option<serde_json::Value>,
    ) -> (AgentRegistration, bool) {
        let mut created = false;
        let entry = self.registrations.entry(instance_id.to_string());
        let reg = entry
            .and_modify(|reg| {
                reg.name = name.clone().or_else(|| reg.name.clone());
                reg.connection_details = connection_details.clone().or_else(|| reg.connection_details.clone());
                reg.runtime_config = runtime_config.clone().or_else(|| reg.runtime_config.clone());
                reg.status = "active".to_string();
                reg.health = "healthy".to_string();
            })
            .or_insert_with(|| {
                created = true;
                AgentRegistration {
                    registration_id: format!("reg-{instance_id}"),
                    tenant_id: tenant_id.to_string(),
                    agent_id: agent_id.to_string(),
                    instance_id: instance_id.to_string(),
                    name,
                    connection_details,
                    runtime_config,
                    status: "active".to_string(),
                    health: "healthy".to_string(),
                }
            });
        (reg.clone(), created)
    }

    async fn record_health(&self, instance_id: &str, health: &str) -> Option<()> {
        self.registrations.get_mut(instance_id).map(|mut reg| {
            reg.health = health.to_string();
        })
    }

    async fn deregister(&self, instance_id: &str) -> Option<()> {
        self.registrations.get_mut(instance_id).map(|mut reg| {
            reg.status = "inactive".to_string();
        })
    }

    async fn get_registrations(&self, tenant_id: &str) -> Vec<(AgentRegistration, AgentManifest)> {
        let mut out: Vec<(AgentRegistration, AgentManifest)> = self
            .registrations
            .iter()
            .filter(|entry| entry.value().tenant_id == tenant_id)
            .filter_map(|entry| {
                let reg = entry.value().clone();
                let manifest = self.manifests.get(&reg.agent_id)?.clone();
                Some((reg, manifest))
            })
            .collect();
        out.sort_by(|a, b| a.0.instance_id.cmp(&b.0.instance_id));
        out
    }
}

/// Bundle of every collaborator store, handed to the router as a single
/// `Arc` so handlers don't thread five separate trait objects around.
#[derive(Clone)]
pub struct Stores {
    pub keys: Arc<dyn KeyStore>,
    pub tools: Arc<dyn ToolConfigStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub agents: Arc<dyn AgentCatalog>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            keys: Arc::new(InMemoryKeyStore::new()),
            tools: Arc::new(InMemoryToolConfigStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            agents: Arc::new(InMemoryAgentCatalog::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tool_list_excludes_disabled_and_out_of_scope() {
        let store = InMemoryToolConfigStore::new();
        store.insert(ToolConfig {
            tenant_id: "t1".into(),
            name: "enabled_tool".into(),
            description: None,
            base_url: "https://example.com".into(),
            auth_recipe: ToolAuthRecipe::None,
            operations: vec![],
            parameter_schema: ParameterSchema::default(),
            enabled: true,
            required_scopes: HashSet::new(),
            max_call_deadline: None,
            allow_unauthenticated: true,
        });
        store.insert(ToolConfig {
            tenant_id: "t1".into(),
            name: "disabled_tool".into(),
            description: None,
            base_url: "https://example.com".into(),
            auth_recipe: ToolAuthRecipe::None,
            operations: vec![],
            parameter_schema: ParameterSchema::default(),
            enabled: false,
            required_scopes: HashSet::new(),
            max_call_deadline: None,
            allow_unauthenticated: true,
        });

        let listed = store.list("t1", &HashSet::new()).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "enabled_tool");
    }

    #[tokio::test]
    async fn tool_list_is_scoped_to_tenant() {
        let store = InMemoryToolConfigStore::new();
        store.insert(ToolConfig {
            tenant_id: "tenant-b".into(),
            name: "github_repos".into(),
            description: None,
            base_url: "https://example.com".into(),
            auth_recipe: ToolAuthRecipe::None,
            operations: vec![],
            parameter_schema: ParameterSchema::default(),
            enabled: true,
            required_scopes: HashSet::new(),
            max_call_deadline: None,
            allow_unauthenticated: true,
        });

        let listed = store.list("tenant-a", &HashSet::new()).await;
        assert!(listed.is_empty());
        assert!(store.get("tenant-a", "github_repos").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_first_registrations_yield_one_winner() {
        let catalog = Arc::new(InMemoryAgentCatalog::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                catalog
                    .upsert_registration("t1", "a1", "i1", None, None, None)
                    .await
            }));
        }
        let mut new_count = 0;
        let mut registration_ids = HashSet::new();
        for handle in handles {
            let (reg, is_new) = handle.await.unwrap();
            if is_new {
                new_count += 1;
            }
            registration_ids.insert(reg.registration_id);
        }
        assert_eq!(new_count, 1);
        assert_eq!(registration_ids.len(), 1);
    }
}
