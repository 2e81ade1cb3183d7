use log::{error, info};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Seeding demo tenant into [{}]...", config.database_url());

    let service_state = match service::AppState::init(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(service_state.db_conn_ref(), None).await {
        error!("Failed to apply migrations: {e}");
        std::process::exit(1);
    }

    entity_api::seed_database(service_state.db_conn_ref()).await;
    info!("Seeded; run reindex_embeddings to make the demo policies searchable");
}
