//! Force every display to reconcile.
//!
//! Writes a now-millis marker to `/api/version`, which every display's
//! poll loop notices on its next tick.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::base;

/// POST a fresh version marker, authenticating when `token` is given.
pub async fn run(base_url: &str, token: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let marker = Utc::now().timestamp_millis();

    let mut request = client
        .post(format!("{}/api/version", base(base_url)))
        .json(&json!({"value": marker}));
    if let Some(token) = token {
        request = request.header("X-Admin-Token", token);
    }

    let response = request.send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(format!("bump rejected ({status}): {message}").into());
    }

    info!(version = %body.get("version").cloned().unwrap_or(serde_json::Value::Null), "version marker overwritten");
    Ok(())
}
