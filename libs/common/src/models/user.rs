//! User model and related functionality

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Account role, serialized as the lowercase `perfil` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Usuario,
    Administrador,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Usuario => "usuario",
            Role::Administrador => "administrador",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Administrador)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usuario" => Ok(Role::Usuario),
            "administrador" => Ok(Role::Administrador),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub nombre_usuario: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub fecha_nacimiento: NaiveDate,
    pub imagen_perfil: Option<String>,
    pub perfil: Role,
    pub activo: bool,
    pub fecha_registro: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.perfil.is_admin()
    }
}

/// New user creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub nombre_usuario: String,
    pub password: String,
    pub fecha_nacimiento: NaiveDate,
    #[serde(default)]
    pub imagen_perfil: Option<String>,
    /// Only honoured on the admin creation path
    #[serde(default)]
    pub perfil: Option<Role>,
}

impl NewUser {
    /// Trim names and lowercase the email before validation and storage
    pub fn normalized(mut self) -> Self {
        self.nombre = self.nombre.trim().to_string();
        self.apellido = self.apellido.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.nombre_usuario = self.nombre_usuario.trim().to_string();
        self.imagen_perfil = self
            .imagen_perfil
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        self
    }
}

/// User update payload
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub nombre_usuario: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub imagen_perfil: Option<String>,
    pub perfil: Option<Role>,
}

impl UpdateUser {
    pub fn normalized(mut self) -> Self {
        self.nombre = self.nombre.map(|s| s.trim().to_string());
        self.apellido = self.apellido.map(|s| s.trim().to_string());
        self.email = self.email.map(|s| s.trim().to_lowercase());
        self.nombre_usuario = self.nombre_usuario.map(|s| s.trim().to_string());
        self
    }
}

/// User login credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email_or_username: String,
    pub password: String,
}
