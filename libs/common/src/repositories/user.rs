//! User repository for database operations

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{DatabaseError, UserError, UserResult},
    models::{NewUser, Role, UpdateUser, User},
    validation,
};

const USER_COLUMNS: &str = "id, nombre, apellido, email, nombre_usuario, password_hash, \
     fecha_nacimiento, imagen_perfil, perfil, activo, fecha_registro";

/// Hash a plain-text password into an Argon2 PHC string
pub fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored hash; malformed hashes never match
pub fn verify_password(user: &User, password: &str) -> bool {
    match PasswordHash::new(&user.password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash for {} is malformed: {}", user.id, e);
            false
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, DatabaseError> {
    let perfil: String = row.get("perfil");
    Ok(User {
        id: row.get("id"),
        nombre: row.get("nombre"),
        apellido: row.get("apellido"),
        email: row.get("email"),
        nombre_usuario: row.get("nombre_usuario"),
        password_hash: row.get("password_hash"),
        fecha_nacimiento: row.get("fecha_nacimiento"),
        imagen_perfil: row.get("imagen_perfil"),
        perfil: perfil.parse().map_err(DatabaseError::Corrupt)?,
        activo: row.get("activo"),
        fecha_registro: row.get("fecha_registro"),
    })
}

/// Translate a unique-index violation into the matching conflict
fn conflict_from(err: DatabaseError) -> UserError {
    if !err.is_unique_violation() {
        return UserError::Database(err);
    }

    match err.constraint() {
        Some(name) if name.contains("email") => UserError::EmailTaken,
        _ => UserError::UsernameTaken,
    }
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new user.
    ///
    /// `allow_role` is only set by the admin creation path; everywhere else
    /// the requested `perfil` is ignored and the account is a plain `usuario`.
    pub async fn create(&self, new_user: NewUser, allow_role: bool) -> UserResult<User> {
        let new_user = new_user.normalized();
        validation::validate_new_user(&new_user, Utc::now().date_naive())
            .map_err(UserError::Validation)?;

        self.ensure_available(Some(&new_user.email), Some(&new_user.nombre_usuario), None)
            .await?;

        let password_hash = hash_password(&new_user.password)?;
        let perfil = if allow_role {
            new_user.perfil.unwrap_or_default()
        } else {
            Role::Usuario
        };

        info!("Creating new user: {}", new_user.nombre_usuario);

        let query = format!(
            r#"
            INSERT INTO usuarios (id, nombre, apellido, email, nombre_usuario, password_hash,
                                  fecha_nacimiento, imagen_perfil, perfil)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&new_user.nombre)
            .bind(&new_user.apellido)
            .bind(&new_user.email)
            .bind(&new_user.nombre_usuario)
            .bind(&password_hash)
            .bind(new_user.fecha_nacimiento)
            .bind(&new_user.imagen_perfil)
            .bind(perfil.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_from(DatabaseError::Query(e)))?;

        Ok(user_from_row(&row)?)
    }

    /// Case-insensitive uniqueness pre-check, optionally excluding one user
    async fn ensure_available(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        exclude: Option<Uuid>,
    ) -> UserResult<()> {
        if let Some(email) = email {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM usuarios
                    WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
                )
                "#,
            )
            .bind(email)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            if taken {
                return Err(UserError::EmailTaken);
            }
        }

        if let Some(username) = username {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM usuarios
                    WHERE LOWER(nombre_usuario) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
                )
                "#,
            )
            .bind(username)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            if taken {
                return Err(UserError::UsernameTaken);
            }
        }

        Ok(())
    }

    /// Find an active user by email (identifier contains `@`) or username
    pub async fn find_active_by_login(&self, identifier: &str) -> UserResult<Option<User>> {
        let column = if identifier.contains('@') {
            "email"
        } else {
            "nombre_usuario"
        };

        let query = format!(
            "SELECT {USER_COLUMNS} FROM usuarios WHERE LOWER({column}) = LOWER($1) AND activo"
        );

        let row = sqlx::query(&query)
            .bind(identifier.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    /// Find a user by ID, active or not
    pub async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    /// List users, newest registration first
    pub async fn list(&self, include_inactive: bool) -> UserResult<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM usuarios WHERE $1 OR activo ORDER BY fecha_registro DESC"
        );

        let rows = sqlx::query(&query)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Apply a partial update. `perfil` must already be cleared by callers
    /// that are not allowed to change it.
    pub async fn update(&self, id: Uuid, update: UpdateUser) -> UserResult<User> {
        let update = update.normalized();
        validation::validate_update_user(&update, Utc::now().date_naive())
            .map_err(UserError::Validation)?;

        self.ensure_available(
            update.email.as_deref(),
            update.nombre_usuario.as_deref(),
            Some(id),
        )
        .await?;

        let query = format!(
            r#"
            UPDATE usuarios SET
                nombre = COALESCE($2, nombre),
                apellido = COALESCE($3, apellido),
                email = COALESCE($4, email),
                nombre_usuario = COALESCE($5, nombre_usuario),
                fecha_nacimiento = COALESCE($6, fecha_nacimiento),
                imagen_perfil = COALESCE($7, imagen_perfil),
                perfil = COALESCE($8, perfil),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(&update.nombre)
            .bind(&update.apellido)
            .bind(&update.email)
            .bind(&update.nombre_usuario)
            .bind(update.fecha_nacimiento)
            .bind(&update.imagen_perfil)
            .bind(update.perfil.map(|p| p.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_from(DatabaseError::Query(e)))?
            .ok_or(UserError::NotFound)?;

        info!("Updated user {}", id);
        Ok(user_from_row(&row)?)
    }

    /// Enable or disable (soft delete) an account
    pub async fn set_active(&self, id: Uuid, activo: bool) -> UserResult<User> {
        let query = format!(
            "UPDATE usuarios SET activo = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(activo)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?
            .ok_or(UserError::NotFound)?;

        info!("User {} active flag set to {}", id, activo);
        Ok(user_from_row(&row)?)
    }

    /// Grant the administrator role to the account with this email.
    /// Returns false when no such account exists.
    pub async fn promote_to_admin(&self, email: &str) -> UserResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE usuarios SET perfil = 'administrador', updated_at = NOW()
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
