//! User administration service

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::{hash_password, normalize_email};
use shared::{User, UserRole};

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// User row as stored; `role` is the text column
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub warehouse_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self) -> AppResult<User> {
        let role = UserRole::from_str(&self.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", self.role)))?;
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            warehouse_id: self.warehouse_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub warehouse_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, role, warehouse_id, is_active, created_at, updated_at";

/// Warehouse staff need an existing warehouse; other roles carry none
async fn resolve_assignment(
    conn: &mut PgConnection,
    role: UserRole,
    warehouse_id: Option<Uuid>,
) -> AppResult<Option<Uuid>> {
    if role != UserRole::Warehouse {
        return Ok(None);
    }

    let warehouse_id = warehouse_id.ok_or_else(|| {
        AppError::validation("warehouse_id", "Warehouse staff must be assigned a warehouse")
    })?;

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
        .bind(warehouse_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Warehouse".to_string()));
    }

    Ok(Some(warehouse_id))
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        let email = normalize_email(&input.email)?;
        let password_hash = hash_password(&input.password)?;

        let mut tx = self.db.begin().await?;
        let warehouse_id = resolve_assignment(&mut tx, input.role, input.warehouse_id).await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, role, warehouse_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&email)
        .bind(input.name.trim())
        .bind(&password_hash)
        .bind(input.role.as_str())
        .bind(warehouse_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %row.id, role = %input.role, "User created");
        row.into_user()
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?
            .into_user()
    }

    /// Update name, role, warehouse assignment, active flag or password
    pub async fn update(
        &self,
        acting_user: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<User> {
        input.validate()?;

        if acting_user == user_id && input.is_active == Some(false) {
            return Err(AppError::validation(
                "is_active",
                "You cannot deactivate your own account",
            ));
        }

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?
        .into_user()?;

        let role = input.role.unwrap_or(current.role);
        let warehouse_id =
            resolve_assignment(&mut tx, role, input.warehouse_id.or(current.warehouse_id)).await?;
        let password_hash = input
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                role = $3,
                warehouse_id = $4,
                is_active = COALESCE($5, is_active),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(role.as_str())
        .bind(warehouse_id)
        .bind(input.is_active)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, role = %role, "User updated");
        row.into_user()
    }
}
