use std::sync::Arc;

use quoteflow_core::config::{AppConfig, ConfigError, LoadOptions};
use quoteflow_db::{connect_with_settings, migrations, DbPool, LocalAuthProvider, Repositories};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;
use crate::guard::ServiceGuard;
use crate::services::AppServices;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub repositories: Repositories,
    pub services: AppServices,
    pub auth: Arc<LocalAuthProvider>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState { services: self.services.clone(), auth: self.auth.clone() }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let repositories = Repositories::sqlite(db_pool.clone());
    let services =
        AppServices::new(&repositories, ServiceGuard::from_config(&config.services));
    let auth = Arc::new(LocalAuthProvider::from_repositories(&repositories, &config.auth));

    Ok(Application { config, db_pool, repositories, services, auth })
}
