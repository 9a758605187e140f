//! API models for request and response payloads

use common::models::{Role, User};
use uuid::Uuid;

pub mod post;
pub mod stats;

/// The authenticated caller, resolved from the bearer token and the
/// current state of the account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub nombre_usuario: String,
    pub imagen_perfil: Option<String>,
    pub perfil: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.perfil.is_admin()
    }

    /// Callers may act on their own account; admins on any
    pub fn can_manage_user(&self, user_id: Uuid) -> bool {
        self.id == user_id || self.is_admin()
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nombre_usuario: user.nombre_usuario.clone(),
            imagen_perfil: user.imagen_perfil.clone(),
            perfil: user.perfil,
        }
    }
}
