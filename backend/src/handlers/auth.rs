//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthTokens, RegisterInput};
use crate::services::AuthService;
use crate::AppState;
use shared::User;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create the first administrator; refused once any user exists
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthTokens>)> {
    let service = AuthService::new(state.db, &state.config);
    let tokens = service.register_first_admin(body).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthTokens>> {
    let service = AuthService::new(state.db, &state.config);
    let tokens = service.login(&body.email, &body.password).await?;
    Ok(Json(tokens))
}

pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> AppResult<Json<User>> {
    let service = AuthService::new(state.db, &state.config);
    let user = service.me(current_user.0.user_id).await?;
    Ok(Json(user))
}
