//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use common::{
    jwt::{Claims, bearer_token},
    models::User,
};
use tracing::error;

use crate::{error::AuthError, state::AppState};

/// Validate the bearer token and make its claims available to handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AuthError::Unauthorized("Token no proporcionado".to_string()))?;

    let claims = authenticate(&state, token).await?;
    require_active(state.user_repository.find_by_id(claims.sub).await?)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// A valid token only grants access while its account is still active
pub fn require_active(usuario: Option<User>) -> Result<User, AuthError> {
    usuario.filter(|u| u.activo).ok_or_else(AuthError::invalid_token)
}

/// Check signature, expiry and the revocation list for a raw token
pub async fn authenticate(state: &AppState, token: &str) -> Result<Claims, AuthError> {
    let claims = state.jwt_service.validate(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        AuthError::invalid_token()
    })?;

    let revoked = state
        .revocations
        .is_revoked(claims.jti)
        .await
        .map_err(|e| {
            error!("Failed to check token revocation: {}", e);
            AuthError::InternalServerError
        })?;

    if revoked {
        return Err(AuthError::invalid_token());
    }

    Ok(claims)
}
