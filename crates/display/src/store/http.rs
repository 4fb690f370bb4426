//! HTTP implementation of the remote store, speaking the Barberboard
//! server API (`GET`/`POST /api/{path}`).
//!
//! Plain HTTP hosting has no push channel, so `subscribe` is a per-path
//! poll at the configured interval: the current value is delivered
//! immediately, later deliveries only on change. `poll_version` fetches the
//! statically served version document with a cache-busting query parameter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{ConfigError, SyncConfig};

use super::remote::{RecordPath, RemoteError, RemoteStore, Subscription};

/// Client for a hosted Barberboard server.
///
/// Cheaply cloneable; clones share one connection pool and one cached
/// session probe.
#[derive(Clone)]
pub struct HttpRemoteStore {
    inner: Arc<HttpRemoteStoreInner>,
}

struct HttpRemoteStoreInner {
    client: reqwest::Client,
    base: String,
    admin_token: Option<SecretString>,
    poll_interval: Duration,
    session_ok: AtomicBool,
}

impl HttpRemoteStore {
    /// Create a client for the server at `base_url`.
    #[must_use]
    pub fn new(base_url: &Url, admin_token: Option<SecretString>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(HttpRemoteStoreInner {
                client: reqwest::Client::new(),
                base: base_url.as_str().trim_end_matches('/').to_string(),
                admin_token,
                poll_interval,
                session_ok: AtomicBool::new(false),
            }),
        }
    }

    /// Build a client from a loaded [`SyncConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the config has no remote URL (embedded
    /// configs).
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .remote_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("BARBERBOARD_REMOTE_URL".to_string()))?;
        Ok(Self::new(
            base_url,
            config.admin_token.clone(),
            config.poll_interval,
        ))
    }

    fn api_url(&self, path: RecordPath) -> String {
        format!("{}/api/{}", self.inner.base, path.as_str())
    }

    fn poll_url(&self, now_millis: i64) -> String {
        format!("{}/settings-version.json?t={now_millis}", self.inner.base)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.inner.base)
    }

    /// Map a response to JSON, folding HTTP-level failures into the error
    /// taxonomy.
    async fn read_json(
        response: reqwest::Response,
        path: RecordPath,
    ) -> Result<Value, RemoteError> {
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RemoteError::PermissionDenied {
                path,
                message: truncate(&body, 200),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Transport(format!(
                "HTTP {status}: {}",
                truncate(&body, 200)
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(
                %path,
                error = %e,
                body = %truncate(&body, 500),
                "remote returned a non-JSON body"
            );
            RemoteError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    /// Probe `/health` once and cache success; later calls are free.
    async fn ensure_session(&self) -> Result<(), RemoteError> {
        if self.inner.session_ok.load(Ordering::Relaxed) {
            return Ok(());
        }
        let response = self.inner.client.get(self.health_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Auth(format!(
                "health probe returned HTTP {status}"
            )));
        }
        self.inner.session_ok.store(true, Ordering::Relaxed);
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: RecordPath) -> Result<Value, RemoteError> {
        let response = self.inner.client.get(self.api_url(path)).send().await?;
        Self::read_json(response, path).await
    }

    #[instrument(skip(self, value), fields(path = %path))]
    async fn set(&self, path: RecordPath, value: Value) -> Result<(), RemoteError> {
        let mut request = self.inner.client.post(self.api_url(path)).json(&value);
        if let Some(token) = &self.inner.admin_token {
            request = request.header("X-Admin-Token", token.expose_secret());
        }
        let response = request.send().await?;
        Self::read_json(response, path).await?;
        Ok(())
    }

    async fn subscribe(&self, path: RecordPath) -> Result<Subscription, RemoteError> {
        let (tx, rx) = mpsc::channel(8);
        let store = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Delivered values are deduplicated by serialized form so the
            // stream only carries changes.
            let mut last_seen: Option<String> = None;
            loop {
                ticker.tick().await;
                let value = match store.get(path).await {
                    Ok(value) => value,
                    Err(e) => {
                        debug!(%path, error = %e, "subscription poll failed, retrying next tick");
                        continue;
                    }
                };
                let fingerprint = value.to_string();
                if last_seen.as_deref() == Some(fingerprint.as_str()) {
                    continue;
                }
                last_seen = Some(fingerprint);
                if tx.send(value).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::with_task(rx, task))
    }

    /// The static version document, cache-busted with the current millis.
    async fn poll_version(&self) -> Result<Value, RemoteError> {
        let url = self.poll_url(Utc::now().timestamp_millis());
        let response = self.inner.client.get(url).send().await?;
        Self::read_json(response, RecordPath::Version).await
    }
}

fn truncate(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> HttpRemoteStore {
        let url = Url::parse("http://127.0.0.1:8000").unwrap();
        HttpRemoteStore::new(&url, None, Duration::from_secs(3))
    }

    #[test]
    fn test_api_urls() {
        let store = store();
        assert_eq!(
            store.api_url(RecordPath::Settings),
            "http://127.0.0.1:8000/api/settings"
        );
        assert_eq!(
            store.api_url(RecordPath::Version),
            "http://127.0.0.1:8000/api/version"
        );
        assert_eq!(store.health_url(), "http://127.0.0.1:8000/health");
    }

    #[test]
    fn test_poll_url_carries_cache_buster() {
        let store = store();
        assert_eq!(
            store.poll_url(1_700_000_000_000),
            "http://127.0.0.1:8000/settings-version.json?t=1700000000000"
        );
    }

    #[test]
    fn test_base_url_with_path_is_preserved() {
        let url = Url::parse("http://example.com/board/").unwrap();
        let store = HttpRemoteStore::new(&url, None, Duration::from_secs(3));
        assert_eq!(
            store.api_url(RecordPath::Contacts),
            "http://example.com/board/api/contacts"
        );
    }

    #[test]
    fn test_truncate_limits_output() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
