use log::{error, info, warn};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};

/// Brings the database schema up to date and checks that the review
/// providers can be built from the configuration.
#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting legalcheck in {:?} against [{}]",
        config.runtime_env,
        config.database_url()
    );

    let state = match service::AppState::init(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    let db = state.db_conn_ref();

    if let Err(e) = Migrator::up(db, None).await {
        error!("Failed to apply migrations: {e}");
        std::process::exit(1);
    }
    info!("Database schema is up to date");

    match domain::gateway::Providers::from_config(&state.config) {
        Ok(providers) => info!(
            "Review providers ready: embeddings by {}, analysis by {}",
            providers.embedder.provider_id(),
            providers.analyzer.provider_id()
        ),
        Err(e) => warn!("Review providers are not available: {e}"),
    }
}
