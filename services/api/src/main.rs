use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod error;
mod middleware;
mod models;
mod repositories;
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

use crate::{repositories::PostRepository, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    database::run_migrations(&pool).await?;

    // Initialize repositories
    let user_repository = UserRepository::new(pool.clone());
    let post_repository = PostRepository::new(pool.clone());

    let (posts, comments) = post_repository.backfill_comment_ids().await?;
    if comments > 0 {
        info!("Assigned ids to {} comments across {} posts", comments, posts);
    }

    if let Ok(email) = std::env::var("ADMIN_EMAIL") {
        if user_repository.promote_to_admin(&email).await? {
            info!("Granted administrator role to {}", email);
        } else {
            warn!("ADMIN_EMAIL {} does not match any user", email);
        }
    }

    let app_state = AppState {
        db_pool: pool,
        jwt_service: JwtService::new(JwtConfig::from_env()?),
        revocations: RevocationList::new(&RedisConfig::from_env()?)?,
        user_repository,
        post_repository,
        storage: ObjectStorage::new(&StorageConfig::from_env()?).await,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let server = ServerConfig::load("API", 3001)?;
    let listener = tokio::net::TcpListener::bind(server.address()).await?;
    info!("API service listening on {}", server.address());

    axum::serve(listener, app).await?;

    Ok(())
}
