//! Error type for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::UserError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AuthError {
    pub fn invalid_credentials() -> Self {
        AuthError::Unauthorized("Credenciales inválidas".to_string())
    }

    pub fn invalid_token() -> Self {
        AuthError::Unauthorized("Token inválido o usuario no encontrado".to_string())
    }
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken | UserError::UsernameTaken => {
                AuthError::Conflict(err.to_string())
            }
            UserError::Validation(msg) => AuthError::BadRequest(msg),
            UserError::NotFound => AuthError::NotFound(err.to_string()),
            UserError::PasswordHash(_) | UserError::Database(_) => {
                error!("User operation failed: {}", err);
                AuthError::InternalServerError
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
