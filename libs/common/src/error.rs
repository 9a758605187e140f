//! Custom error types for the common library
//!
//! This module defines the storage and user-domain errors shared by both
//! services.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl DatabaseError {
    /// True when the query failed on a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Name of the constraint a failed query hit, if the database reported one
    pub fn constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.constraint(),
            _ => None,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by user registration, lookup and administration
#[derive(Error, Debug)]
pub enum UserError {
    #[error("El email ya está registrado")]
    EmailTaken,

    #[error("El nombre de usuario ya está en uso")]
    UsernameTaken,

    #[error("Usuario no encontrado")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type UserResult<T> = Result<T, UserError>;
