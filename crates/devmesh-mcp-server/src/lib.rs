//! Multi-tenant MCP protocol server core.
//!
//! Wires the transport (`transport`), the per-connection state machine
//! (`session`), the authenticator (`auth`), the method router
//! (`router`/`handlers`), the tool registry and executor (`registry`,
//! `executor`), the agent registrar (`agent_registrar`), and the
//! resource/prompt providers (`resource_provider`) into a running server
//! (`server`).

pub mod agent_registrar;
pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod resource_provider;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::Server;
