use std::sync::Arc;

use db::DBService;
use services::services::{
    auth::AuthService,
    domain_events::{
        DispatcherBuilder, DomainEventDispatcher, HandlerContext, RelayBroadcastHandler,
    },
    realtime::Relay,
};
use thiserror::Error;
use utils::config::ServerConfig;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Composition root: every service the routes and the socket handler share.
#[derive(Clone)]
pub struct Deployment {
    config: Arc<ServerConfig>,
    db: DBService,
    relay: Relay,
    events: Arc<DomainEventDispatcher>,
    auth: AuthService,
}

impl Deployment {
    pub async fn new(config: ServerConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Ok(Self::with_db(config, db))
    }

    /// Deployment backed by a private in-memory database.
    pub async fn new_in_memory(config: ServerConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new_in_memory().await?;
        Ok(Self::with_db(config, db))
    }

    fn with_db(config: ServerConfig, db: DBService) -> Self {
        let relay = Relay::new(config.relay.clone());
        let events = DispatcherBuilder::new(HandlerContext::new(relay.clone()))
            .with_handler(RelayBroadcastHandler::new())
            .build();
        let auth = AuthService::new(db.clone(), config.jwt_secret.clone(), config.jwt_ttl);

        Self {
            config: Arc::new(config),
            db,
            relay,
            events: Arc::new(events),
            auth,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn events(&self) -> &DomainEventDispatcher {
        &self.events
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }
}
