//! JWT service for token generation and validation
//!
//! Tokens are signed with HS256 using a shared secret so both services can
//! verify them. The payload mirrors what the web client decodes for display:
//! `sub`, `email`, `nombreUsuario`, `perfil` and optionally `imagenPerfil`.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Token lifetime in seconds (default: 1 hour)
    pub expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC secret used to sign and verify tokens
    /// - `JWT_EXPIRY`: Token lifetime in seconds (default: 3600)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        if secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 bytes long");
        }

        let expiry = std::env::var("JWT_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Ok(JwtConfig { secret, expiry })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub email: String,
    pub nombre_usuario: String,
    pub perfil: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagen_perfil: Option<String>,
    /// Token id, used by the revocation list
    pub jti: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

impl Claims {
    /// Seconds until expiry, zero once expired
    pub fn remaining_lifetime(&self) -> u64 {
        self.exp.saturating_sub(now())
    }
}

/// A freshly signed token together with the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

fn now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Issue an access token for a user
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let iat = now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            nombre_usuario: user.nombre_usuario.clone(),
            perfil: user.perfil,
            imagen_perfil: user.imagen_perfil.clone(),
            jti: Uuid::new_v4(),
            iat,
            exp: iat + self.config.expiry,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedToken { token, claims })
    }

    /// Validate a token's signature and expiry and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Token lifetime in seconds
    pub fn expiry(&self) -> u64 {
        self.config.expiry
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "a-test-secret-that-is-long-enough".into(),
            expiry: 900,
        })
    }

    fn user(perfil: Role) -> User {
        User {
            id: Uuid::new_v4(),
            nombre: "Ana".into(),
            apellido: "Gómez".into(),
            email: "ana@example.com".into(),
            nombre_usuario: "ana".into(),
            password_hash: String::new(),
            fecha_nacimiento: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            imagen_perfil: Some("https://cdn.example.com/ana.png".into()),
            perfil,
            activo: true,
            fecha_registro: Utc::now(),
        }
    }

    #[test]
    fn issued_token_validates_with_expected_payload() {
        let jwt = service();
        let admin = user(Role::Administrador);

        let issued = jwt.issue(&admin).unwrap();
        let claims = jwt.validate(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, admin.id);
        assert_eq!(claims.nombre_usuario, "ana");
        assert_eq!(claims.perfil, Role::Administrador);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn payload_uses_client_field_names() {
        let jwt = service();
        let issued = jwt.issue(&user(Role::Usuario)).unwrap();
        let json = serde_json::to_value(&issued.claims).unwrap();

        assert!(json.get("nombreUsuario").is_some());
        assert!(json.get("imagenPerfil").is_some());
        assert_eq!(json["perfil"], "usuario");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = JwtService::new(JwtConfig {
            secret: "another-secret-also-long-enough".into(),
            expiry: 900,
        });
        let issued = other.issue(&user(Role::Usuario)).unwrap();
        assert!(service().validate(&issued.token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service();
        let mut claims = jwt.issue(&user(Role::Usuario)).unwrap().claims;
        claims.iat = now() - 7200;
        claims.exp = now() - 3600;

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-that-is-long-enough"),
        )
        .unwrap();

        assert!(jwt.validate(&token).is_err());
        assert_eq!(claims.remaining_lifetime(), 0);
    }

    #[test]
    fn token_expired_seconds_ago_is_rejected() {
        let jwt = service();
        let mut claims = jwt.issue(&user(Role::Usuario)).unwrap().claims;
        claims.exp = now() - 10;

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-that-is-long-enough"),
        )
        .unwrap();

        assert_eq!(claims.remaining_lifetime(), 0);
        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }
}
