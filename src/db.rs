use std::{str::FromStr, sync::Arc};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::{
    error::AppError,
    services::gateway::{MemoryGateway, RemoteGateway, SqlGateway},
};

pub type DbPool = SqlitePool;

pub const MEMORY_URL: &str = "memory";

pub async fn init_pool(database_url: &str) -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Builds the gateway named by `database_url`: `memory` for a process-local
/// store, anything else is handed to SQLite and migrated.
pub async fn init_gateway(database_url: &str) -> Result<Arc<dyn RemoteGateway>, AppError> {
    if database_url == MEMORY_URL {
        info!("using in-memory store, data is lost on exit");
        return Ok(Arc::new(MemoryGateway::new()));
    }

    let pool = init_pool(database_url).await?;
    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }
    Ok(Arc::new(SqlGateway::new(pool)))
}
