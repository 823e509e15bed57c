//! `logging/setLevel`.

use crate::session::SessionHandle;
use devmesh_mcp_protocol::error::Error;
use serde_json::Value;

pub fn set_level(session: &SessionHandle, params: Option<Value>) -> Result<Value, Error> {
    let request: devmesh_mcp_protocol::types::SetLevelRequest = super::parse_params(params)?;
    session.set_log_level(request.level);
    Ok(serde_json::json!({}))
}
