//! `/estadisticas` handlers, administrators only

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{
        post::Post,
        stats::{self, DateRange, StatsQuery},
    },
};

async fn visible_posts(
    state: &AppState,
    query: &StatsQuery,
) -> ApiResult<(Vec<Post>, DateRange)> {
    let range = DateRange::parse(query).map_err(ApiError::BadRequest)?;
    let posts = state.post_repository.list_visible().await?;
    Ok((posts, range))
}

pub async fn posts_per_user(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (posts, range) = visible_posts(&state, &query).await?;
    Ok(Json(stats::posts_per_user(&posts, &range)))
}

pub async fn comment_totals(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (posts, range) = visible_posts(&state, &query).await?;
    Ok(Json(stats::comment_totals(&posts, &range)))
}

pub async fn comments_per_post(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (posts, range) = visible_posts(&state, &query).await?;
    Ok(Json(stats::comments_per_post(&posts, &range)))
}
