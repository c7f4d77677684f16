use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::registry::auth;
use crate::state::AppState;

/// The user behind the `Authorization: Bearer <session-token>` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub token: Uuid,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing session token".to_string()))?;

        let token = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized("malformed session token".to_string()))?;
        let user_id = auth::authenticate(state, token)?;

        Ok(Self { user_id, token })
    }
}
