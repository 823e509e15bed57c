//! Shared application state: every long-lived collaborator a handler might
//! need, bundled once behind an `Arc` and handed to every session.

use crate::agent_registrar::AgentRegistrar;
use crate::config::ServerConfig;
use crate::executor::ToolExecutor;
use crate::metrics::SharedMetrics;
use crate::rate_limit::RateLimitRegistry;
use crate::registry::ToolRegistry;
use crate::resource_provider::ResourceProvider;
use crate::store::Stores;
use std::sync::Arc;

pub struct AppState {
    pub config: ServerConfig,
    pub tools: ToolRegistry,
    pub executor: ToolExecutor,
    pub registrar: Arc<AgentRegistrar>,
    pub resources: ResourceProvider,
    pub rate_limits: RateLimitRegistry,
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(config: ServerConfig, stores: Stores) -> Self {
        let registrar = Arc::new(AgentRegistrar::new(stores.agents.clone()));
        let metrics = crate::metrics::Metrics::new();
        let rate_limits = RateLimitRegistry::new(
            config.rate_limit.requests_per_period,
            std::time::Duration::from_secs(config.rate_limit.period_seconds),
            config.rate_limit.burst_size,
        );
        Self {
            tools: ToolRegistry::new(stores.tools.clone()),
            executor: ToolExecutor::new(
                ToolRegistry::new(stores.tools.clone()),
                stores.credentials.clone(),
                config.default_call_deadline(),
                config.max_call_deadline(),
            ),
            registrar: registrar.clone(),
            resources: ResourceProvider::new(registrar, metrics.clone()),
            rate_limits,
            metrics,
            config,
        }
    }
}
