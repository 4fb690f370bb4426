//! Version marker handlers and the static poll target.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{self, VersionDoc};

use super::admin::require_admin;
use super::parse_body;

pub async fn get_version(State(state): State<AppState>) -> Json<Value> {
    Json(state.store().version().await)
}

/// Overwrite the marker with a client-chosen value; the displays write
/// now-millis here to force everyone else to reconcile.
pub async fn put_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let value = store::unwrap_key(parse_body(&body), "value");
    if !value.is_number() {
        return Err(ApiError::BadRequest("Missing value".to_string()));
    }
    let version = state.store().set_version(value).await?;
    info!(version = %version, "version marker overwritten");
    Ok(Json(json!({"ok": true, "version": version})))
}

/// `GET /settings-version.json`, what every display polls. The admin
/// token never leaves the server.
pub async fn version_document(State(state): State<AppState>) -> Json<VersionDoc> {
    Json(state.store().version_doc().await.redacted())
}
