//! `/publicaciones` handlers

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::storage::{self, MAX_IMAGE_BYTES};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{
        AuthUser,
        post::{
            CommentPageQuery, CommentRequest, ImageUploadQuery, NewPost, Post, PostQuery,
            UpdatePost,
        },
    },
};

const POST_BUCKET: &str = "publicaciones";
const LAST_POSTS: i64 = 3;

/// Storage path of a post image: `posts/{id}:{index}.{ext}`
pub fn image_file_name(post_id: Uuid, index: u32, extension: &str) -> String {
    format!("{}:{}.{}", post_id, index, extension)
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewPost>,
) -> ApiResult<impl IntoResponse> {
    let post = Post::new(&user, payload, Utc::now())?;
    let post = state.post_repository.insert(&post).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn find_all(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.post_repository.list(&query).await?))
}

pub async fn find_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.post_repository.find_visible(id).await?))
}

pub async fn last_three(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let posts = state
        .post_repository
        .latest_by_user(user.id, LAST_POSTS)
        .await?;

    Ok(Json(posts))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePost>,
) -> ApiResult<impl IntoResponse> {
    let (post, ()) = state
        .post_repository
        .mutate(id, |post| post.apply_update(&user, payload))
        .await?;

    info!("Post {} updated by {}", id, user.nombre_usuario);
    Ok(Json(post))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let (post, ()) = state
        .post_repository
        .mutate(id, |post| post.soft_delete(&user, now))
        .await?;

    info!("Post {} deleted by {}", id, user.nombre_usuario);
    Ok(Json(post))
}

pub async fn like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (post, _) = state
        .post_repository
        .mutate(id, |post| Ok(post.like(user.id)))
        .await?;

    Ok(Json(post))
}

pub async fn unlike(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (post, _) = state
        .post_repository
        .mutate(id, |post| Ok(post.unlike(user.id)))
        .await?;

    Ok(Json(post))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let (post, comment) = state
        .post_repository
        .mutate(id, |post| post.add_comment(&user, &payload.content, now))
        .await?;

    info!(
        "Comment {:?} added to post {} by {}",
        comment.id, id, user.nombre_usuario
    );
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let (_, comment) = state
        .post_repository
        .mutate(id, |post| {
            post.edit_comment(comment_id, &user, &payload.content, now)
        })
        .await?;

    Ok(Json(comment))
}

pub async fn comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentPageQuery>,
) -> ApiResult<impl IntoResponse> {
    let post = state.post_repository.find_visible(id).await?;
    Ok(Json(post.comment_page(&query)))
}

/// Upload an image for a post the caller owns and store its public URL
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImageUploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let index = query.index()?;

    let post = state.post_repository.find_visible(id).await?;
    if !post.is_owned_by(&user) {
        return Err(ApiError::Forbidden(
            "No permitido: solo el dueño puede subir imágenes a esta publicación".into(),
        ));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Formulario inválido: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(storage::image_extension)
            .ok_or_else(|| ApiError::BadRequest("Solo se permiten archivos de imagen".into()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("No se pudo leer el archivo: {}", e)))?;

        if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::BadRequest(
                "El archivo debe pesar como máximo 5MB".into(),
            ));
        }

        let filename = image_file_name(id, index, &extension);
        let image_url = state
            .storage
            .upload(
                POST_BUCKET,
                &format!("posts/{}", filename),
                bytes.to_vec(),
                storage::content_type_for(&extension),
            )
            .await
            .map_err(|e| {
                error!("Failed to upload image for post {}: {}", id, e);
                ApiError::InternalServerError
            })?;

        let url = image_url.clone();
        let (publication, ()) = state
            .post_repository
            .mutate(id, |post| post.set_image(&user, url))
            .await?;

        info!("Image {} stored for post {}", filename, id);
        return Ok(Json(json!({
            "imageUrl": image_url,
            "filename": filename,
            "publication": publication,
        })));
    }

    Err(ApiError::BadRequest(
        "No se proporcionó ningún archivo".into(),
    ))
}
