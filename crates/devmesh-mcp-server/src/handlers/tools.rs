//! `tools/list` and `tools/call`.

use crate::state::AppState;
use devmesh_mcp_protocol::context::RequestContext;
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{CallToolRequest, ListToolsRequest, ListToolsResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub async fn list_tools(state: &AppState, ctx: &RequestContext, params: Option<Value>) -> Result<Value, Error> {
    let _request: ListToolsRequest = super::parse_params(params)?;
    let tools = state.tools.list(ctx.tenant_id(), ctx.principal.scopes.as_ref()).await;
    Ok(serde_json::to_value(ListToolsResult { tools }).expect("ListToolsResult always serializes"))
}

pub async fn call_tool(
    state: &AppState,
    ctx: &RequestContext,
    params: Option<Value>,
    cancellation: CancellationToken,
) -> Result<Value, Error> {
    let request: CallToolRequest = super::parse_params(params)?;
    let result = state.executor.call(ctx, request, cancellation).await?;
    Ok(serde_json::to_value(result).expect("CallToolResult always serializes"))
}
