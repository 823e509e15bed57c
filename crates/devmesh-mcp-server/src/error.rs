//! Server-level error type: the boundary where I/O, configuration, and
//! collaborator-store failures enter the protocol's closed taxonomy.
//!
//! Every variant here has a clear `devmesh_mcp_protocol::ErrorKind` it
//! becomes once it crosses into a handler response, via the `From`
//! conversion at the bottom of this file.

use devmesh_mcp_protocol::{Error as ProtocolError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error(transparent)]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<ServerError> for ProtocolError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Protocol(e) => e,
            other => ProtocolError::new(ErrorKind::Internal, other.to_string()),
        }
    }
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
