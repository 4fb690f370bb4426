//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Records (JSON in, JSON out)
//! GET  /api/settings           - Current shop settings ({} when unset)
//! POST /api/settings           - Replace settings, bump version
//! GET  /api/contacts           - Contact list ([] when unset)
//! POST /api/contacts           - Replace contact list, bump version
//! GET  /api/gallery            - Gallery list ([] when unset)
//! POST /api/gallery            - Replace gallery, bump version
//! GET  /api/background         - Background record (null when unset)
//! POST /api/background         - Replace, or delete with {clear: true}
//!
//! # Version marker
//! GET  /api/version            - Current marker value
//! POST /api/version            - Overwrite the marker (client-side bump)
//! GET  /settings-version.json  - Poll target: the version document,
//!                                admin token redacted
//!
//! # Admin
//! POST /api/admin-token        - Set or rotate the admin token
//!
//! # Health
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (data directory reachable)
//! ```
//!
//! Every record `POST` requires `X-Admin-Token` matching the stored token;
//! while no token is configured, writes are open (bootstrap allowance).
//! All responses carry permissive CORS and `Cache-Control: no-store`;
//! a display must never act on a cached version document.

pub mod admin;
pub mod records;
pub mod version;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Create the record and version routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings",
            get(records::get_settings).post(records::put_settings),
        )
        .route(
            "/contacts",
            get(records::get_contacts).post(records::put_contacts),
        )
        .route(
            "/gallery",
            get(records::get_gallery).post(records::put_gallery),
        )
        .route(
            "/background",
            get(records::get_background).post(records::put_background),
        )
        .route(
            "/version",
            get(version::get_version).post(version::put_version),
        )
        .route("/admin-token", post(admin::set_admin_token))
}

/// The whole application: routes, layers, state.
pub fn app(state: AppState) -> Router {
    let cache_control = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-admin-token"),
        ]);

    Router::new()
        .nest("/api", api_routes())
        .route("/settings-version.json", get(version::version_document))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .fallback(fallback)
        .layer(cache_control)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint: verifies the data directory is
/// reachable. Returns 503 Service Unavailable when it is not.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match tokio::fs::metadata(state.store().data_dir()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn fallback() -> ApiError {
    ApiError::NotFound
}

/// Parse a request body as JSON; empty or malformed bodies read as an
/// empty object, the tolerance the legacy server had.
pub(crate) fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return json!({});
    }
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}
