//! `initialize`: protocol version negotiation and capability exchange.

use crate::session::{SessionHandle, SessionState};
use devmesh_mcp_protocol::error::Error;
use devmesh_mcp_protocol::types::{Implementation, InitializeRequest, InitializeResult, ServerCapabilities};
use devmesh_mcp_protocol::SUPPORTED_PROTOCOL_VERSIONS;
use serde_json::Value;

pub async fn initialize(session: &SessionHandle, params: Option<Value>) -> Result<Value, Error> {
    if session.state() != SessionState::Connected {
        return Err(Error::new(
            devmesh_mcp_protocol::error::ErrorKind::InvalidRequest,
            "session already initialized",
        ));
    }

    let request: InitializeRequest = super::parse_params(params)?;

    let negotiated = negotiate_version(&request.protocol_version)
        .ok_or_else(|| Error::new(
            devmesh_mcp_protocol::error::ErrorKind::UnsupportedVersion,
            format!(
                "unsupported protocol version '{}', supported: {:?}",
                request.protocol_version, SUPPORTED_PROTOCOL_VERSIONS
            ),
        ))?;

    session.set_protocol_version(negotiated);
    session.set_state(SessionState::Initialized);

    let result = InitializeResult {
        protocol_version: negotiated.to_string(),
        server_info: Implementation {
            name: "devmesh-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        capabilities: ServerCapabilities::default_for_server(),
    };
    Ok(serde_json::to_value(result).expect("InitializeResult always serializes"))
}

/// A version we don't speak is rejected outright, never silently
/// substituted — a client that asked for `1999-01-01` needs to know we
/// can't honor that, not receive a result claiming a version it never
/// requested.
fn negotiate_version(requested: &str) -> Option<&'static str> {
    SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == requested).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_accepts_exact_match() {
        assert_eq!(negotiate_version("2024-11-05"), Some("2024-11-05"));
    }

    #[test]
    fn negotiate_rejects_unknown_version() {
        assert_eq!(negotiate_version("1999-01-01"), None);
    }
}
