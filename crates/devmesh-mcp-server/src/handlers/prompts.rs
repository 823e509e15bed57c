//! `prompts/list`.

use crate::state::AppState;
use devmesh_mcp_protocol::types::ListPromptsResult;
use serde_json::Value;

pub fn list_prompts(state: &AppState) -> Value {
    let prompts = state.resources.prompts();
    serde_json::to_value(ListPromptsResult { prompts }).expect("ListPromptsResult always serializes")
}
