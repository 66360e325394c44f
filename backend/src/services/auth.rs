//! Authentication service: first-admin bootstrap, login and token handling

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::user::UserRow;
use shared::{validate_email, validate_password, User, UserRole};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

/// Input for creating the first administrator
#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: UserRole,
    pub warehouse_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

/// Issued bearer token together with the user it belongs to
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Lowercase an e-mail and check its shape
pub(crate) fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    validate_email(&email).map_err(|msg| AppError::validation("email", msg))?;
    Ok(email)
}

/// bcrypt hash after the strength check
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password).map_err(|msg| AppError::validation("password", msg))?;
    Ok(hash(password, DEFAULT_COST)?)
}

/// Decode and verify an access token
pub fn decode_claims(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

impl AuthService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Create the first user as admin. Only works while no user exists.
    pub async fn register_first_admin(&self, input: RegisterInput) -> AppResult<AuthTokens> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "Name is required"));
        }
        let email = normalize_email(&input.email)?;
        let password_hash = hash_password(&input.password)?;

        let mut tx = self.db.begin().await?;

        // Serializes concurrent bootstrap attempts
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(AppError::Conflict(
                "Registration is closed; ask an administrator for an account".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            VALUES ($1, $2, $3, 'admin')
            RETURNING id, email, name, password_hash, role, warehouse_id, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %row.id, "Bootstrap administrator created");
        self.issue(row.into_user()?)
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        let email = email.trim().to_lowercase();

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, password_hash, role, warehouse_id, is_active,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !verify(password, &row.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        if !row.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        self.issue(row.into_user()?)
    }

    /// Load the account behind a token
    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, password_hash, role, warehouse_id, is_active,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?
        .into_user()
    }

    fn issue(&self, user: User) -> AppResult<AuthTokens> {
        let access_token = self.encode_token(&user)?;
        Ok(AuthTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }

    fn encode_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            warehouse_id: user.warehouse_id,
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4().to_string(),
            role: UserRole::Warehouse,
            warehouse_id: Some(Uuid::new_v4()),
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_decode_roundtrip_keeps_scope() {
        let original = claims(600);
        let token = token_for(&original, "secret");
        let decoded = decode_claims(&token, "secret").unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.role, UserRole::Warehouse);
        assert_eq!(decoded.warehouse_id, original.warehouse_id);
    }

    #[test]
    fn test_wrong_secret_is_invalid_token() {
        let token = token_for(&claims(600), "secret");
        assert!(matches!(
            decode_claims(&token, "other"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_reported() {
        // well past the default 60s leeway
        let token = token_for(&claims(-3600), "secret");
        assert!(matches!(
            decode_claims(&token, "secret"),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ops@Example.COM ").unwrap(), "ops@example.com");
        assert!(normalize_email("nope").is_err());
    }
}
