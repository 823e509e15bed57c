//! Structured logging setup.
//!
//! One process-wide subscriber, initialized once at startup. Format is
//! `pretty` for local development and `json` for anything deployed,
//! matching the two tracing-subscriber feature flags this workspace
//! carries (`env-filter`, `json`).

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

/// Logs a protocol error once, at a level derived from its kind, with the
/// correlation id as a structured field rather than interpolated text so
/// log aggregation can filter on it directly.
pub fn log_error(err: &devmesh_mcp_protocol::Error) {
    use devmesh_mcp_protocol::ErrorKind;
    let id = err.id;
    match err.kind {
        ErrorKind::Internal | ErrorKind::Overloaded => {
            tracing::error!(error_id = %id, kind = ?err.kind, message = %err.message, "request failed");
        }
        ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::Cancelled => {
            tracing::warn!(error_id = %id, kind = ?err.kind, message = %err.message, "request failed");
        }
        _ => {
            tracing::info!(error_id = %id, kind = ?err.kind, message = %err.message, "request failed");
        }
    }
}
