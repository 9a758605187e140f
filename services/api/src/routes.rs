//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use common::storage::MAX_IMAGE_BYTES;
use serde_json::json;

use crate::{
    AppState,
    middleware::{admin_middleware, auth_middleware},
};

pub mod posts;
pub mod stats;
pub mod users;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/publicaciones", post(posts::create))
        .route("/publicaciones/last-three", get(posts::last_three))
        .route(
            "/publicaciones/:id",
            patch(posts::update).delete(posts::remove),
        )
        .route("/publicaciones/:id/comment", post(posts::add_comment))
        .route(
            "/publicaciones/:id/comments/:comment_id/edit",
            post(posts::edit_comment),
        )
        .route("/publicaciones/:id/like", post(posts::like))
        .route("/publicaciones/:id/unlike", post(posts::unlike))
        .route(
            "/publicaciones/:id/upload-image",
            post(posts::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route("/usuarios", get(users::list))
        .route(
            "/usuarios/:id",
            get(users::find_one)
                .patch(users::update)
                .delete(users::remove),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/usuarios/admin/listar", get(users::list_all))
        .route("/usuarios/admin/crear", post(users::admin_create))
        .route("/usuarios/admin/:id/deshabilitar", post(users::disable))
        .route("/usuarios/admin/:id/habilitar", post(users::enable))
        .route(
            "/estadisticas/publicaciones-por-usuario",
            get(stats::posts_per_user),
        )
        .route("/estadisticas/comentarios-totales", get(stats::comment_totals))
        .route(
            "/estadisticas/comentarios-por-publicacion",
            get(stats::comments_per_post),
        )
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/publicaciones", get(posts::find_all))
        .route("/publicaciones/:id", get(posts::find_one))
        .route("/publicaciones/:id/comments", get(posts::comments))
        .route("/usuarios", post(users::register))
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool).await;

    Json(json!({
        "status": if database { "ok" } else { "unhealthy" },
        "service": "api-service",
        "database": database,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
