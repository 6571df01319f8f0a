use std::{sync::Arc, time::Duration};

use marketplace_explore::{
    app,
    features::explore::session::SessionRegistry,
    services::{database::Database, redis::Redis},
    utilities::{app_state::AppState, config::Config},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init().await?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "marketplace_explore={},tower_http={}",
                    config.tracing_level, config.tracing_level
                )
                .to_lowercase()
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database = Arc::new(Database::new(&config).await?);
    let redis = Arc::new(Redis::new(&config).await?);

    let sessions = SessionRegistry::new(config.session_idle_timeout());
    sessions.spawn_sweeper(SWEEP_INTERVAL);

    let server_address = config.server_address.clone();
    let state = AppState {
        config,
        listings: database.clone(),
        locations: database,
        snapshots: redis,
        sessions,
    };

    let listener = TcpListener::bind(&server_address).await?;
    info!("listening on {}", server_address);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
