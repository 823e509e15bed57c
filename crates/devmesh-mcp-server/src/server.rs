//! Top-level server: wires config, stores, the authenticator, and the
//! transport together and runs until a shutdown signal arrives.

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::state::AppState;
use crate::store::Stores;
use crate::transport;
use std::sync::Arc;

pub struct Server {
    config: ServerConfig,
    app: Arc<AppState>,
    auth: Arc<Authenticator>,
}

impl Server {
    /// Wires a server over the in-memory store implementations. A
    /// deployment backed by a real tenant/credential/catalog service
    /// swaps `Stores` for one built from those collaborators; nothing
    /// else here changes.
    pub fn new(config: ServerConfig, stores: Stores, credential_salt: impl Into<String>) -> Self {
        let auth = Arc::new(Authenticator::new(stores.keys.clone(), credential_salt));
        let app = Arc::new(AppState::new(config.clone(), stores));
        Self { config, app, auth }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.app
    }

    pub async fn run(self) -> ServerResult<()> {
        let app = transport::build_app(self.app.clone(), self.auth.clone());
        transport::serve(app, &self.config.listen_addr).await
    }
}
