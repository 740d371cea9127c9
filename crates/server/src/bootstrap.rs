use axum::Router;
use haulrate_core::config::{AppConfig, ConfigError, LoadOptions};
use haulrate_db::{connect_with_config, migrations, DbPool, SqlRateCatalog};
use thiserror::Error;
use tracing::info;

use crate::{health, rates};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

impl Application {
    /// Health probe and rate API over the application's pool.
    pub fn router(&self) -> Router {
        health::router(self.db_pool.clone()).merge(rates::router(
            SqlRateCatalog::new(self.db_pool.clone()),
            self.config.import.max_rows,
        ))
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

#[cfg(test)]
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

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    Ok(Application { config, db_pool })
}

pub fn load_config() -> Result<AppConfig, BootstrapError> {
    Ok(AppConfig::load(LoadOptions::default())?)
}
