//! Fetch and log every record from a running server.

use serde_json::Value;
use tracing::info;

use super::base;

const RECORDS: [&str; 5] = ["settings", "contacts", "gallery", "background", "version"];

/// Fetch each API record plus the version document and log them.
pub async fn run(base_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = base(base_url);

    for record in RECORDS {
        let value: Value = client
            .get(format!("{base}/api/{record}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(record, %value, "fetched");
    }

    let doc: Value = client
        .get(format!("{base}/settings-version.json"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    info!(
        version = %doc.get("version").cloned().unwrap_or(serde_json::Value::Null),
        updated_at = doc.get("updatedAt").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
        "version document"
    );

    Ok(())
}
