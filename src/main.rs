use std::sync::Arc;

use roteiro::config::AppConfig;
use roteiro::db::init_gateway;
use roteiro::error::AppError;
use roteiro::routes::create_router;
use roteiro::services::storage::LocalStorage;
use roteiro::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let gateway = init_gateway(&config.database_url).await?;

    let storage = LocalStorage::new(config.storage_root.clone(), config.public_base_url.clone());
    storage.ensure_structure().await?;

    let state = AppState::new(config.clone(), gateway, Arc::new(storage));
    state.trips.refresh_all().await?;

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,roteiro=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
