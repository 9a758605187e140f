//! Application state shared across handlers

use common::{
    cache::RevocationList, jwt::JwtService, repositories::UserRepository, storage::ObjectStorage,
};
use sqlx::PgPool;

use crate::repositories::PostRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub revocations: RevocationList,
    pub user_repository: UserRepository,
    pub post_repository: PostRepository,
    pub storage: ObjectStorage,
}
