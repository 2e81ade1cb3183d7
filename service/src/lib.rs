//! Infrastructure shared by the review binaries: configuration, logging and
//! the database pool.
use config::Config;
use log::info;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Arc;
use tokio::time::Duration;

pub mod config;
pub mod logging;

/// Opens the connection pool and checks that the database answers.
pub async fn init_database(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new::<&str>(config.database_url());
    opt.max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime_secs))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;
    db.ping().await?;
    info!(
        "Connected to the database with {}..{} pooled connections",
        config.db_min_connections, config.db_max_connections
    );
    Ok(db)
}

/// The pool and the loaded configuration, cloned into every task that needs them.
#[derive(Clone)]
pub struct AppState {
    pub database_connection: Arc<DatabaseConnection>,
    pub config: Config,
}

impl AppState {
    /// Loads the configuration and connects.
    pub async fn init(config: Config) -> Result<Self, DbErr> {
        let db = init_database(&config).await?;
        Ok(Self {
            database_connection: Arc::new(db),
            config,
        })
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.database_connection.as_ref()
    }
}
