//! Redis-backed token revocation list
//!
//! Logged-out and rotated tokens are remembered here until their natural
//! expiry so the bearer middleware of every service can refuse them.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use tracing::info;
use uuid::Uuid;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Set of revoked token ids, each stored with a TTL
#[derive(Clone)]
pub struct RevocationList {
    client: Client,
}

impl RevocationList {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Redis key under which a token id is recorded
    pub fn key(token_id: Uuid) -> String {
        format!("revoked_token:{}", token_id)
    }

    /// Revoke a token for `ttl_seconds`; a zero TTL is a no-op since the
    /// token is already expired.
    pub async fn revoke(&self, token_id: Uuid, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(Self::key(token_id), "1", ttl_seconds).await?;
        info!("Revoked token {} for {}s", token_id, ttl_seconds);
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: Uuid) -> Result<bool> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(Self::key(token_id)).await?;
        Ok(exists)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
