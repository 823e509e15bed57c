//! `resources/list`, `resources/read`, `resources/subscribe`, `resources/unsubscribe`.

use crate::session::SessionHandle;
use crate::state::AppState;
use devmesh_mcp_protocol::context::RequestContext;
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, SubscribeRequest, UnsubscribeRequest,
};
use serde_json::Value;

pub fn list_resources(state: &AppState, ctx: &RequestContext) -> Value {
    let resources = state.resources.list(ctx.tenant_id());
    serde_json::to_value(ListResourcesResult {
        resources,
        next_cursor: None,
    })
    .expect("ListResourcesResult always serializes")
}

pub async fn read_resource(state: &AppState, ctx: &RequestContext, params: Option<Value>) -> Result<Value, Error> {
    let request: ReadResourceRequest = super::parse_params(params)?;
    let contents = state.resources.read(ctx.tenant_id(), &request.uri).await?;
    Ok(serde_json::to_value(ReadResourceResult {
        contents: vec![contents],
    })
    .expect("ReadResourceResult always serializes"))
}

pub fn subscribe(state: &AppState, session: &SessionHandle, params: Option<Value>) -> Result<Value, Error> {
    let request: SubscribeRequest = super::parse_params(params)?;
    state
        .resources
        .subscriptions
        .subscribe(session.id, request.uri, session.notify_tx.clone());
    Ok(serde_json::json!({}))
}

pub fn unsubscribe(state: &AppState, session: &SessionHandle, params: Option<Value>) -> Result<Value, Error> {
    let request: UnsubscribeRequest = super::parse_params(params)?;
    state.resources.subscriptions.unsubscribe(session.id, &request.uri);
    Ok(serde_json::json!({}))
}
