//! Application state shared across handlers

use common::{
    cache::RevocationList, jwt::JwtService, repositories::UserRepository, storage::ObjectStorage,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub revocations: RevocationList,
    pub user_repository: UserRepository,
    pub storage: ObjectStorage,
}
