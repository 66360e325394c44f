//! User management handlers (admin only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserInput};
use crate::services::UserService;
use crate::AppState;
use shared::User;

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    current_user.0.require_user_admin()?;
    let user = UserService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<User>>> {
    current_user.0.require_user_admin()?;
    let users = UserService::new(state.db).list().await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    current_user.0.require_user_admin()?;
    let user = UserService::new(state.db).get(user_id).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    current_user.0.require_user_admin()?;
    let user = UserService::new(state.db)
        .update(current_user.0.user_id, user_id, input)
        .await?;
    Ok(Json(user))
}
