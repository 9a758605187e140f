//! `/usuarios` handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::models::{NewUser, UpdateUser};
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::AuthUser,
};

/// Decide what of an update the caller may apply to `target`.
///
/// Non-admins may only edit themselves and never change their role; a
/// `perfil` equal to the current one is dropped rather than rejected.
pub fn authorize_update(
    caller: &AuthUser,
    target: Uuid,
    mut update: UpdateUser,
) -> Result<UpdateUser, ApiError> {
    if !caller.can_manage_user(target) {
        return Err(ApiError::Forbidden(
            "No tienes permiso para modificar este usuario".into(),
        ));
    }

    if !caller.is_admin() {
        match update.perfil {
            Some(perfil) if perfil != caller.perfil => {
                return Err(ApiError::Forbidden(
                    "Solo un administrador puede cambiar el perfil".into(),
                ));
            }
            _ => update.perfil = None,
        }
    }

    Ok(update)
}

/// Public sign-up
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let usuario = state.user_repository.create(payload, false).await?;
    Ok((StatusCode::CREATED, Json(usuario)))
}

/// Active users
pub async fn list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.user_repository.list(false).await?))
}

pub async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let usuario = state
        .user_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuario no encontrado".into()))?;

    Ok(Json(usuario))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    let payload = authorize_update(&caller, id, payload)?;
    let usuario = state.user_repository.update(id, payload).await?;

    Ok(Json(usuario))
}

/// Soft delete: the account is deactivated, never removed
pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !caller.can_manage_user(id) {
        return Err(ApiError::Forbidden(
            "No tienes permiso para eliminar este usuario".into(),
        ));
    }

    let usuario = state.user_repository.set_active(id, false).await?;
    info!("User {} deactivated by {}", id, caller.nombre_usuario);

    Ok(Json(usuario))
}

/// Every account, including deactivated ones
pub async fn list_all(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.user_repository.list(true).await?))
}

/// Admin creation; the requested `perfil` is honoured
pub async fn admin_create(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let usuario = state.user_repository.create(payload, true).await?;
    info!(
        "User {} created by administrator {}",
        usuario.nombre_usuario, caller.nombre_usuario
    );

    Ok((StatusCode::CREATED, Json(usuario)))
}

pub async fn disable(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let usuario = state.user_repository.set_active(id, false).await?;
    info!("User {} disabled by {}", id, caller.nombre_usuario);

    Ok(Json(usuario))
}

pub async fn enable(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let usuario = state.user_repository.set_active(id, true).await?;
    info!("User {} enabled by {}", id, caller.nombre_usuario);

    Ok(Json(usuario))
}
