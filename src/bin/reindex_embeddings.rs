use domain::{embedding_index, gateway::Providers};
use log::{error, info};
use service::{config::Config, logging::Logger};

/// Recomputes the embedding of every live policy and rule, e.g. after the
/// embedding model or its dimensionality has changed.
#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    let providers = match Providers::from_config(&config) {
        Ok(providers) => providers,
        Err(e) => {
            error!("Failed to configure the embedding provider: {e}");
            std::process::exit(1);
        }
    };

    let state = match service::AppState::init(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    let db = state.db_conn_ref();

    match embedding_index::reindex(
        db,
        providers.embedder.as_ref(),
        state.config.embedding_requests_per_minute,
    )
    .await
    {
        Ok(summary) if summary.failed == 0 => info!(
            "Embedded {} items, skipped {} policies without a description",
            summary.embedded, summary.skipped
        ),
        Ok(summary) => {
            error!(
                "{} items could not be embedded ({} succeeded)",
                summary.failed, summary.embedded
            );
            std::process::exit(1);
        }
        Err(e) => {
            error!("Re-embedding failed: {e}");
            std::process::exit(1);
        }
    }
}
