//! Common library for the Red Social backend
//!
//! This crate provides functionality shared by the auth and api services:
//! database connectivity and migrations, the Redis token revocation list,
//! JWT handling, the user model and repository, input validation, object
//! storage and server settings.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod jwt;
pub mod models;
pub mod repositories;
pub mod settings;
pub mod storage;
pub mod validation;
