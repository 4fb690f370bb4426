//! Set or rotate the server admin token.

use serde_json::{Value, json};
use tracing::info;

use super::base;

/// POST a new admin token. While no token is stored the server accepts
/// the write unauthenticated (bootstrap); once one is set, `current`
/// must match it.
pub async fn run(
    base_url: &str,
    token: &str,
    current: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();

    let mut request = client
        .post(format!("{}/api/admin-token", base(base_url)))
        .json(&json!({"token": token}));
    if let Some(current) = current {
        request = request.header("X-Admin-Token", current);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or_default();
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(format!("token update rejected ({status}): {message}").into());
    }

    info!("admin token updated");
    Ok(())
}
