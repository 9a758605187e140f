//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::{
    jwt::{Claims, IssuedToken},
    models::{LoginCredentials, NewUser, User},
    repositories::user::verify_password,
    storage::{self, MAX_IMAGE_BYTES},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AuthError,
    middleware::{auth_middleware, authenticate, require_active},
    state::AppState,
};

const PROFILE_BUCKET: &str = "perfiles";

/// Response for token generation
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario: Option<User>,
}

impl TokenResponse {
    fn new(issued: IssuedToken, usuario: Option<User>) -> Self {
        Self {
            expires_in: issued.claims.remaining_lifetime(),
            access_token: issued.token,
            token_type: "Bearer",
            usuario,
        }
    }
}

/// Request carrying a token in the body
#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/authorize", post(authorize))
        .route(
            "/auth/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool).await;

    Json(json!({
        "status": if database { "ok" } else { "unhealthy" },
        "service": "auth-service",
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Register a new account with the default `usuario` role
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Registration attempt for user: {}", payload.nombre_usuario);

    let usuario = state.user_repository.create(payload, false).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Usuario registrado exitosamente",
            "usuario": usuario,
        })),
    ))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Login attempt for user: {}", payload.email_or_username);

    let usuario = state
        .user_repository
        .find_active_by_login(&payload.email_or_username)
        .await?
        .ok_or_else(AuthError::invalid_credentials)?;

    if !verify_password(&usuario, &payload.password) {
        warn!("Invalid password for user: {}", usuario.nombre_usuario);
        return Err(AuthError::invalid_credentials());
    }

    let issued = state.jwt_service.issue(&usuario).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        AuthError::InternalServerError
    })?;

    Ok(Json(TokenResponse::new(issued, Some(usuario))))
}

/// Exchange a still valid token for a fresh one; the old token is revoked.
///
/// The token may be sent as a bearer header or as `{ "token": ... }`.
pub async fn refresh_token(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    body: Option<Json<TokenRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let token = match (&bearer, &body) {
        (Some(TypedHeader(auth)), _) => auth.token().to_string(),
        (None, Some(Json(body))) => body.token.clone(),
        (None, None) => {
            return Err(AuthError::BadRequest("Token no proporcionado".to_string()));
        }
    };

    let claims = authenticate(&state, &token).await?;

    let usuario = require_active(state.user_repository.find_by_id(claims.sub).await?)?;

    let issued = state.jwt_service.issue(&usuario).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        AuthError::InternalServerError
    })?;

    state
        .revocations
        .revoke(claims.jti, claims.remaining_lifetime())
        .await
        .map_err(|e| {
            error!("Failed to revoke refreshed token: {}", e);
            AuthError::InternalServerError
        })?;

    info!("Token refreshed for user: {}", usuario.nombre_usuario);
    Ok(Json(TokenResponse::new(issued, None)))
}

/// Report whether a token is currently accepted, with its payload
pub async fn authorize(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    match authenticate(&state, &payload.token).await {
        Ok(claims) => Ok(Json(json!({ "valid": true, "payload": claims }))),
        Err(AuthError::Unauthorized(_)) => Ok(Json(json!({ "valid": false, "payload": null }))),
        Err(e) => Err(e),
    }
}

/// Revoke the bearer token for the rest of its lifetime
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .revocations
        .revoke(claims.jti, claims.remaining_lifetime())
        .await
        .map_err(|e| {
            error!("Failed to revoke token: {}", e);
            AuthError::InternalServerError
        })?;

    info!("User {} logged out", claims.nombre_usuario);
    Ok(Json(json!({ "message": "Sesión cerrada correctamente" })))
}

/// Current user's profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AuthError> {
    let usuario = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AuthError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(Json(usuario))
}

/// Upload a profile picture and return its public URL
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AuthError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AuthError::BadRequest(format!("Formulario inválido: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(storage::image_extension)
            .ok_or_else(|| AuthError::BadRequest("Solo se permiten archivos de imagen".into()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AuthError::BadRequest(format!("No se pudo leer el archivo: {}", e)))?;

        if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
            return Err(AuthError::BadRequest(
                "El archivo debe pesar como máximo 5MB".into(),
            ));
        }

        let path = format!("perfiles/{}.{}", Uuid::new_v4().simple(), extension);
        let image_url = state
            .storage
            .upload(
                PROFILE_BUCKET,
                &path,
                bytes.to_vec(),
                storage::content_type_for(&extension),
            )
            .await
            .map_err(|_| AuthError::InternalServerError)?;

        return Ok(Json(json!({ "imageUrl": image_url })));
    }

    Err(AuthError::BadRequest(
        "No se proporcionó ningún archivo".into(),
    ))
}
