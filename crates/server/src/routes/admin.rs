//! Admin-token management and the write guard.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

use super::parse_body;

/// The header clients present their token in.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Gate for record writes: passes while no token is configured (the
/// bootstrap allowance) or when the caller presented the stored one.
pub(super) async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.store().admin_token().await else {
        return Ok(());
    };
    if provided_token(headers) == expected {
        Ok(())
    } else {
        Err(ApiError::Forbidden("invalid admin token".to_string()))
    }
}

/// `POST /api/admin-token` — set or rotate the token. The first token
/// needs no credentials; rotation requires the current one.
pub async fn set_admin_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_body(&body);
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Missing token".to_string()));
    }

    if let Some(existing) = state.store().admin_token().await {
        if provided_token(&headers) != existing {
            return Err(ApiError::Forbidden("invalid current token".to_string()));
        }
    }

    state.store().set_admin_token(token.to_string()).await?;
    info!("admin token set");
    Ok(Json(json!({"ok": true})))
}

fn provided_token(headers: &HeaderMap) -> &str {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
