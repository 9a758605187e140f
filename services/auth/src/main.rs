use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;
mod routes;
mod state;

use common::{
    cache::{RedisConfig, RevocationList},
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
    repositories::UserRepository,
    settings::ServerConfig,
    storage::{ObjectStorage, StorageConfig},
};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if !database::health_check(&pool).await {
        anyhow::bail!("Failed to connect to database");
    }
    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?);
    let revocations = RevocationList::new(&RedisConfig::from_env()?)?;
    let storage = ObjectStorage::new(&StorageConfig::from_env()?).await;

    let app_state = AppState {
        user_repository: UserRepository::new(pool.clone()),
        db_pool: pool,
        jwt_service,
        revocations,
        storage,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let server = ServerConfig::load("AUTH", 3000)?;
    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    info!("Authentication service listening on {}", server.address());

    axum::serve(listener, app).await?;

    Ok(())
}
