use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::errors::AppError;
use crate::models::User;
use crate::services::credentials;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user: User,
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = req.username.clone();
    let user = state
        .db
        .run(move |conn| credentials::authenticate(conn, &req.username, &req.password))
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %username, "login rejected");
            AppError::Unauthorized
        })?;

    let token = jwt::issue_token(&user, &state.config.jwt_secret, state.config.token_ttl_hours)
        .map_err(|e| AppError::Internal(format!("failed to issue token: {e}")))?;

    tracing::info!(user_id = user.id, username = %user.username, "login succeeded");
    Ok(Json(LoginResponse { token, user }))
}
