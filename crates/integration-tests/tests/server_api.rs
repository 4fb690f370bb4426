//! Server API flows over a real socket.
//!
//! The routing layer has in-process tests of its own; these exercise the
//! flows a deployment sees end to end: record writes bumping the version
//! document, the admin-token lifecycle, and the poll target displays fetch.

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use barberboard_integration_tests::TestServer;

async fn get_json(client: &Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("non-JSON body")
}

async fn post_json(
    client: &Client,
    url: &str,
    body: &Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = client.post(url).json(body);
    if let Some(token) = token {
        request = request.header("X-Admin-Token", token);
    }
    let response = request.send().await.expect("request failed");
    let status = response.status();
    let body = response.json().await.expect("non-JSON body");
    (status, body)
}

// ============================================================================
// Record writes
// ============================================================================

#[tokio::test]
async fn test_record_writes_bump_the_version_document() {
    let server = TestServer::start().await;
    let client = Client::new();

    let (status, body) = post_json(
        &client,
        &format!("{}/api/settings", server.base_url),
        &json!({"settings": {"name": "صالون المدينة"}}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "version": 2}));

    let (status, body) = post_json(
        &client,
        &format!("{}/api/contacts", server.base_url),
        &json!({"contacts": [{"type": "phone", "value": "0112345678"}]}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "count": 1, "version": 3}));

    let doc = get_json(
        &client,
        &format!("{}/settings-version.json", server.base_url),
    )
    .await;
    assert_eq!(doc["version"], json!(3));
    assert_eq!(doc["settings"], json!({"name": "صالون المدينة"}));
    assert!(doc["updatedAt"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_version_overwrite_is_not_an_increment() {
    let server = TestServer::start().await;
    let client = Client::new();

    let marker = 1_724_000_000_000_i64;
    let (status, body) = post_json(
        &client,
        &format!("{}/api/version", server.base_url),
        &json!({"value": marker}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "version": marker}));

    let version = get_json(&client, &format!("{}/api/version", server.base_url)).await;
    assert_eq!(version, json!(marker));
}

// ============================================================================
// Admin-token lifecycle
// ============================================================================

#[tokio::test]
async fn test_admin_token_bootstrap_enforce_rotate() {
    let server = TestServer::start().await;
    let client = Client::new();
    let settings_url = format!("{}/api/settings", server.base_url);
    let token_url = format!("{}/api/admin-token", server.base_url);

    // Bootstrap: the first token needs no credentials
    let (status, body) = post_json(&client, &token_url, &json!({"token": "first"}), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    // Unauthenticated writes are now rejected
    let (status, body) = post_json(&client, &settings_url, &json!({"name": "X"}), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Forbidden: invalid admin token"}));

    // Rotation requires the current token
    let (status, body) =
        post_json(&client, &token_url, &json!({"token": "second"}), Some("wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Forbidden: invalid current token"}));

    let (status, _) =
        post_json(&client, &token_url, &json!({"token": "second"}), Some("first")).await;
    assert_eq!(status, StatusCode::OK);

    // Only the new token writes now
    let (status, _) = post_json(&client, &settings_url, &json!({"name": "X"}), Some("first")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) =
        post_json(&client, &settings_url, &json!({"name": "X"}), Some("second")).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// The poll target
// ============================================================================

#[tokio::test]
async fn test_poll_target_redacts_token_and_disables_caching() {
    let server = TestServer::start_with_token(Some("s3cret")).await;
    let client = Client::new();

    // The cache buster displays append must not confuse routing
    let response = client
        .get(format!(
            "{}/settings-version.json?t=1724000000000",
            server.base_url
        ))
        .header("Origin", "http://display.local")
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-store, no-cache, must-revalidate")
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let body = response.text().await.expect("read body");
    assert!(!body.contains("adminToken"));
    assert!(!body.contains("s3cret"));
}
