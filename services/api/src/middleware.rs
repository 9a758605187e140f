//! Authentication middleware for JWT token validation

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::jwt::bearer_token;
use tracing::error;

use crate::{error::ApiError, models::AuthUser, state::AppState};

fn invalid_token() -> ApiError {
    ApiError::Unauthorized("Token inválido o usuario no encontrado".to_string())
}

/// Authentication middleware.
///
/// Checks signature, expiry and the revocation list, then resolves the
/// account so that deactivated users are turned away and handlers see the
/// current username and photo.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::Unauthorized("Token no proporcionado".to_string()))?;

    let claims = state.jwt_service.validate(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        invalid_token()
    })?;

    let revoked = state
        .revocations
        .is_revoked(claims.jti)
        .await
        .map_err(|e| {
            error!("Failed to check token revocation: {}", e);
            ApiError::InternalServerError
        })?;
    if revoked {
        return Err(invalid_token());
    }

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.activo)
        .ok_or_else(invalid_token)?;

    req.extensions_mut().insert(AuthUser::from(&user));

    Ok(next.run(req).await)
}

/// Only lets administrators through; must run after [`auth_middleware`]
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .is_some_and(AuthUser::is_admin);

    if !is_admin {
        return Err(ApiError::admin_required());
    }

    Ok(next.run(req).await)
}
