//! Record read/write handlers.
//!
//! Reads serve whatever is on disk (defaults when absent); writes replace
//! whole records and bump the version marker, answering with the legacy
//! `{"ok": true, …}` shapes.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::BackgroundWrite;

use super::admin::require_admin;
use super::parse_body;

pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(state.store().settings().await)
}

pub async fn put_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let version = state.store().put_settings(parse_body(&body)).await?;
    info!(version = %version, "settings replaced");
    Ok(Json(json!({"ok": true, "version": version})))
}

pub async fn get_contacts(State(state): State<AppState>) -> Json<Value> {
    Json(state.store().contacts().await)
}

pub async fn put_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let (count, version) = state.store().put_contacts(parse_body(&body)).await?;
    info!(count, version = %version, "contacts replaced");
    Ok(Json(json!({"ok": true, "count": count, "version": version})))
}

pub async fn get_gallery(State(state): State<AppState>) -> Json<Value> {
    Json(state.store().gallery().await)
}

pub async fn put_gallery(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let (count, version) = state.store().put_gallery(parse_body(&body)).await?;
    info!(count, version = %version, "gallery replaced");
    Ok(Json(json!({"ok": true, "count": count, "version": version})))
}

pub async fn get_background(State(state): State<AppState>) -> Json<Value> {
    Json(state.store().background().await)
}

pub async fn put_background(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    match state.store().put_background(parse_body(&body)).await? {
        BackgroundWrite::Replaced(version) => {
            info!(version = %version, "background replaced");
            Ok(Json(json!({"ok": true, "version": version})))
        }
        BackgroundWrite::Cleared(version) => {
            info!(version = %version, "background cleared");
            Ok(Json(json!({"ok": true, "cleared": true, "version": version})))
        }
    }
}
