//! `agent.register`, `agent.health`, `agent.deregister`.

use crate::state::AppState;
use devmesh_mcp_protocol::context::RequestContext;
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{AgentDeregisterRequest, AgentHealthRequest, RegisterAgentRequest};
use serde_json::Value;

pub async fn agent_register(state: &AppState, ctx: &RequestContext, params: Option<Value>) -> Result<Value, Error> {
    let request: RegisterAgentRequest = super::parse_params(params)?;
    let result = state.registrar.register(ctx.tenant_id(), request).await?;
    state.resources.subscriptions.notify(&format!("devmesh://agents/{}", ctx.tenant_id()));
    Ok(serde_json::to_value(result).expect("RegisterAgentResult always serializes"))
}

pub async fn agent_health(state: &AppState, params: Option<Value>) -> Result<Value, Error> {
    let request: AgentHealthRequest = super::parse_params(params)?;
    state.registrar.record_health(request).await?;
    Ok(serde_json::json!({}))
}

pub async fn agent_deregister(state: &AppState, ctx: &RequestContext, params: Option<Value>) -> Result<Value, Error> {
    let request: AgentDeregisterRequest = super::parse_params(params)?;
    state.registrar.deregister(request).await?;
    state.resources.subscriptions.notify(&format!("devmesh://agents/{}", ctx.tenant_id()));
    Ok(serde_json::json!({}))
}
