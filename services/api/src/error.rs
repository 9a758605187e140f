//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{DatabaseError, UserError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::post::PostError;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn admin_required() -> Self {
        ApiError::Forbidden("Acceso denegado. Se requiere perfil de administrador".to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken | UserError::UsernameTaken => ApiError::Conflict(err.to_string()),
            UserError::Validation(msg) => ApiError::BadRequest(msg),
            UserError::NotFound => ApiError::NotFound(err.to_string()),
            UserError::Database(e) => ApiError::Database(e),
            UserError::PasswordHash(_) => {
                error!("User operation failed: {}", err);
                ApiError::InternalServerError
            }
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::NotFound | PostError::CommentNotFound => ApiError::NotFound(err.to_string()),
            PostError::Forbidden(msg) => ApiError::Forbidden(msg),
            PostError::Invalid(msg) => ApiError::BadRequest(msg),
            PostError::Database(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_errors_map_to_http_statuses() {
        let cases = [
            (PostError::NotFound, StatusCode::NOT_FOUND),
            (PostError::CommentNotFound, StatusCode::NOT_FOUND),
            (PostError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (PostError::Invalid("vacío".into()), StatusCode::BAD_REQUEST),
            (
                PostError::Database(DatabaseError::Corrupt("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn user_conflicts_map_to_409() {
        let response = ApiError::from(UserError::UsernameTaken).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_message_is_kept() {
        match ApiError::from(UserError::Validation("Email inválido".into())) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "Email inválido"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn admin_guard_is_forbidden() {
        let response = ApiError::admin_required().into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
