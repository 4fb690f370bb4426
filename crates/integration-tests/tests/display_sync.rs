//! One display client against the real server.
//!
//! Covers the boot pull, change detection through the polled version
//! document, and the degradation path when the server rejects writes.
//! Reconciliation passes are driven by hand (`run_once`) so every
//! assertion is deterministic.

use reqwest::Client;
use serde_json::{Value, json};

use barberboard_core::{ContactKind, ShopSettings};
use barberboard_display::tabs::TabChannel;
use barberboard_display::watch::ReconcileState;
use barberboard_integration_tests::{TestDisplay, TestServer, secret};

async fn seed(server: &TestServer, path: &str, body: &Value) {
    Client::new()
        .post(format!("{}/api/{path}", server.base_url))
        .json(body)
        .send()
        .await
        .expect("seed record");
}

async fn fetch(server: &TestServer, path: &str) -> Value {
    Client::new()
        .get(format!("{}/api/{path}", server.base_url))
        .send()
        .await
        .expect("fetch record")
        .json()
        .await
        .expect("non-JSON record")
}

// ============================================================================
// Boot
// ============================================================================

#[tokio::test]
async fn test_fresh_boot_pulls_server_state_into_cache() {
    let server = TestServer::start().await;
    seed(&server, "settings", &json!({"name": "قص عصري", "chairCount": 5})).await;
    seed(
        &server,
        "contacts",
        &json!([{"id": 1, "type": "phone", "value": "0501234567"}]),
    )
    .await;

    let display = TestDisplay::connect(&server, TabChannel::new(), |_| {});
    display.start().await;

    let data = display.coordinator.snapshot().await;
    assert_eq!(data.settings.name, "قص عصري");
    assert_eq!(data.settings.chair_count, 5);
    assert_eq!(data.board.chairs.len(), 5);
    assert_eq!(data.contacts.len(), 1);

    // Booting never reloads, no matter what the server held
    assert_eq!(display.reloads.count(), 0);

    // The pull landed in the on-disk cache
    let cached: ShopSettings = serde_json::from_slice(
        &std::fs::read(display.cache_dir().join("barbershopSettings.json"))
            .expect("cached settings file"),
    )
    .expect("cached settings entry");
    assert_eq!(cached.name, "قص عصري");

    display.shutdown().await;
}

// ============================================================================
// Version polling
// ============================================================================

#[tokio::test]
async fn test_equal_version_is_quiet_changed_version_reloads_once() {
    let server = TestServer::start().await;
    let display = TestDisplay::connect(&server, TabChannel::new(), |_| {});

    // First pass primes, a stable document stays quiet
    assert_eq!(display.watcher.run_once().await, ReconcileState::NoChange);
    assert_eq!(display.watcher.run_once().await, ReconcileState::NoChange);
    assert_eq!(display.reloads.count(), 0);

    // A write through the API changes the document
    seed(&server, "settings", &json!({"name": "تحديث"})).await;
    assert_eq!(
        display.watcher.run_once().await,
        ReconcileState::ReloadPending
    );
    assert_eq!(display.reloads.count(), 1);

    // The re-pull carried the new data before the reload fired
    assert_eq!(display.coordinator.snapshot().await.settings.name, "تحديث");

    // Stable again
    assert_eq!(display.watcher.run_once().await, ReconcileState::NoChange);
    assert_eq!(display.reloads.count(), 1);
}

#[tokio::test]
async fn test_marker_moving_backwards_still_reloads() {
    let server = TestServer::start().await;
    let display = TestDisplay::connect(&server, TabChannel::new(), |_| {});
    display.watcher.run_once().await;

    seed(&server, "version", &json!({"value": 500})).await;
    assert_eq!(
        display.watcher.run_once().await,
        ReconcileState::ReloadPending
    );

    seed(&server, "version", &json!({"value": 200})).await;
    assert_eq!(
        display.watcher.run_once().await,
        ReconcileState::ReloadPending
    );
    assert_eq!(display.reloads.count(), 2);
}

// ============================================================================
// Write authorization
// ============================================================================

#[tokio::test]
async fn test_rejected_push_keeps_local_state() {
    let server = TestServer::start_with_token(Some("s3cret")).await;
    // No token configured on the display: reads work, writes are rejected
    let display = TestDisplay::connect(&server, TabChannel::new(), |_| {});

    let id = display
        .coordinator
        .add_contact(ContactKind::Instagram, "@royalbarber")
        .await
        .expect("add contact");
    display.coordinator.flush_pushes().await;

    assert!(display.coordinator.delete_contact(id).await);
    display.coordinator.flush_pushes().await;

    // The local deletion stands; the server never saw any of it
    assert!(display.coordinator.snapshot().await.contacts.is_empty());
    assert_eq!(fetch(&server, "contacts").await, json!([]));
}

#[tokio::test]
async fn test_authorized_display_pushes_writes() {
    let server = TestServer::start_with_token(Some("s3cret")).await;
    let display = TestDisplay::connect(&server, TabChannel::new(), |config| {
        config.admin_token = Some(secret("s3cret"));
    });

    let settings = ShopSettings {
        name: "المصرح له".to_owned(),
        ..ShopSettings::default()
    };
    display
        .coordinator
        .save_settings(settings)
        .await
        .expect("save settings");
    display.coordinator.flush_pushes().await;

    assert_eq!(fetch(&server, "settings").await["name"], "المصرح له");
    // The push also stamped a fresh millis marker for other displays
    let version = fetch(&server, "version").await;
    assert!(version.as_i64().is_some_and(|v| v > 1_000_000_000_000));
}
