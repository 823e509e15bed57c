//! One function per JSON-RPC method. Each handler takes the shared
//! application state, the authenticated request context, and the raw
//! `params` value; it deserializes its own params and returns the `result`
//! value the router will wrap in a `JsonRpcResponse`.
//!
//! Handlers never see a `SessionHandle` directly except where session
//! state itself is the thing being mutated (`initialize`, `logging/setLevel`,
//! `$/cancelRequest`) — everything else only needs the `RequestContext`.

mod agents;
mod initialize;
mod logging;
mod prompts;
mod resources;
mod tools;

pub use agents::{agent_deregister, agent_health, agent_register};
pub use initialize::initialize;
pub use logging::set_level;
pub use prompts::list_prompts;
pub use resources::{list_resources, read_resource, subscribe, unsubscribe};
pub use tools::{call_tool, list_tools};

use devmesh_mcp_protocol::error::Error;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserializes `params` into `T`, turning a missing/malformed payload into
/// `invalid_params` rather than a panic or a generic parse error.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, Error> {
    let value = params.unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| Error::invalid_params(e.to_string()))
}
