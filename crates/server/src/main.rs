use anyhow::{self, Error as AnyhowError};
use server::{DeploymentImpl, ServerError, deployment::DeploymentError, start_server};
use thiserror::Error;
use tokio::task::JoinError;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
pub enum SynergySphereError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), SynergySphereError> {
    // Loads `.env` as a side effect, so RUST_LOG may come from there.
    let config = ServerConfig::from_env()?;

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level},client={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(&filter_string)
        .map_err(|e| anyhow::anyhow!("Failed to create tracing filter: {}", e))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let deployment = DeploymentImpl::new(config.clone()).await?;
    let (_, handle) = start_server(deployment, &config.bind_address()).await?;
    handle.await?;

    tracing::info!("Server stopped");
    Ok(())
}
