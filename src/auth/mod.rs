//! Bearer-token authentication for the staff API.

pub mod jwt;
pub mod password;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;

/// Authenticated staff identity, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = jwt::verify_token(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(Identity {
        user_id: claims.sub,
        username: claims.username,
        role: claims.role,
    });

    Ok(next.run(request).await)
}
