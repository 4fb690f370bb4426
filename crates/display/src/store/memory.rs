//! In-process implementation of the remote store.
//!
//! Backs embedded deployments and tests: a shared map plus per-path
//! broadcast channels, so subscriptions are true push rather than polling.
//! Failure knobs simulate the degradation paths (rejected session, denied
//! writes, dead transport) without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast, mpsc};

use super::remote::{RecordPath, RemoteError, RemoteStore, Subscription};

const CHANNEL_CAPACITY: usize = 16;

/// Shared in-process store. Clones share one namespace: a display under
/// test and the test itself hold clones of the same store.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    values: RwLock<HashMap<RecordPath, Value>>,
    channels: HashMap<RecordPath, broadcast::Sender<Value>>,
    reject_session: AtomicBool,
    deny_writes: AtomicBool,
    fail_transport: AtomicBool,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        let paths = [
            RecordPath::Settings,
            RecordPath::Contacts,
            RecordPath::Gallery,
            RecordPath::Background,
            RecordPath::Version,
        ];
        let channels = paths
            .into_iter()
            .map(|path| (path, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();
        Self {
            inner: Arc::new(MemoryInner {
                values: RwLock::new(HashMap::new()),
                channels,
                reject_session: AtomicBool::new(false),
                deny_writes: AtomicBool::new(false),
                fail_transport: AtomicBool::new(false),
            }),
        }
    }

    /// Make `ensure_session` fail with [`RemoteError::Auth`].
    pub fn set_reject_session(&self, reject: bool) {
        self.inner.reject_session.store(reject, Ordering::SeqCst);
    }

    /// Make writes fail with [`RemoteError::PermissionDenied`].
    pub fn set_deny_writes(&self, deny: bool) {
        self.inner.deny_writes.store(deny, Ordering::SeqCst);
    }

    /// Make every operation fail with [`RemoteError::Transport`].
    pub fn set_fail_transport(&self, fail: bool) {
        self.inner.fail_transport.store(fail, Ordering::SeqCst);
    }

    fn check_transport(&self) -> Result<(), RemoteError> {
        if self.inner.fail_transport.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("simulated outage".to_string()));
        }
        Ok(())
    }

    fn sender(&self, path: RecordPath) -> &broadcast::Sender<Value> {
        // The channel map is built over every variant in new()
        self.inner
            .channels
            .get(&path)
            .unwrap_or_else(|| unreachable!("channel missing for {path}"))
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn ensure_session(&self) -> Result<(), RemoteError> {
        self.check_transport()?;
        if self.inner.reject_session.load(Ordering::SeqCst) {
            return Err(RemoteError::Auth("session rejected".to_string()));
        }
        Ok(())
    }

    async fn get(&self, path: RecordPath) -> Result<Value, RemoteError> {
        self.check_transport()?;
        let values = self.inner.values.read().await;
        Ok(values.get(&path).cloned().unwrap_or(Value::Null))
    }

    async fn set(&self, path: RecordPath, value: Value) -> Result<(), RemoteError> {
        self.check_transport()?;
        if self.inner.deny_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::PermissionDenied {
                path,
                message: "writes denied".to_string(),
            });
        }
        {
            let mut values = self.inner.values.write().await;
            values.insert(path, value.clone());
        }
        // No receivers is fine; subscriptions come and go
        let _ = self.sender(path).send(value);
        Ok(())
    }

    async fn subscribe(&self, path: RecordPath) -> Result<Subscription, RemoteError> {
        self.check_transport()?;
        // Register on the broadcast before snapshotting so no write between
        // the two is lost; consecutive duplicates are filtered below.
        let mut updates = self.sender(path).subscribe();
        let current = {
            let values = self.inner.values.read().await;
            values.get(&path).cloned().unwrap_or(Value::Null)
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            let mut last_seen = current.to_string();
            if tx.send(current).await.is_err() {
                return;
            }
            loop {
                let value = match updates.recv().await {
                    Ok(value) => value,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "subscription lagged, resuming");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let fingerprint = value.to_string();
                if fingerprint == last_seen {
                    continue;
                }
                last_seen = fingerprint;
                if tx.send(value).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::with_task(rx, task))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_defaults_to_null() {
        let store = MemoryRemoteStore::new();
        assert_eq!(store.get(RecordPath::Settings).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryRemoteStore::new();
        store
            .set(RecordPath::Settings, json!({"name": "X"}))
            .await
            .unwrap();
        assert_eq!(
            store.get(RecordPath::Settings).await.unwrap(),
            json!({"name": "X"})
        );
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_then_changes() {
        let store = MemoryRemoteStore::new();
        store.set(RecordPath::Version, json!(1)).await.unwrap();

        let mut sub = store.subscribe(RecordPath::Version).await.unwrap();
        assert_eq!(sub.recv().await, Some(json!(1)));

        store.set(RecordPath::Version, json!(2)).await.unwrap();
        assert_eq!(sub.recv().await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_subscribe_to_empty_path_delivers_null() {
        let store = MemoryRemoteStore::new();
        let mut sub = store.subscribe(RecordPath::Background).await.unwrap();
        assert_eq!(sub.recv().await, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_unchanged_write_is_not_redelivered() {
        let store = MemoryRemoteStore::new();
        store.set(RecordPath::Version, json!(5)).await.unwrap();

        let mut sub = store.subscribe(RecordPath::Version).await.unwrap();
        assert_eq!(sub.recv().await, Some(json!(5)));

        // Same value again, then a real change
        store.set(RecordPath::Version, json!(5)).await.unwrap();
        store.set(RecordPath::Version, json!(6)).await.unwrap();
        assert_eq!(sub.recv().await, Some(json!(6)));
    }

    #[tokio::test]
    async fn test_denied_write_leaves_value_alone() {
        let store = MemoryRemoteStore::new();
        store.set(RecordPath::Contacts, json!([1])).await.unwrap();

        store.set_deny_writes(true);
        let err = store.set(RecordPath::Contacts, json!([])).await.unwrap_err();
        assert!(matches!(err, RemoteError::PermissionDenied { .. }));
        store.set_deny_writes(false);

        assert_eq!(store.get(RecordPath::Contacts).await.unwrap(), json!([1]));
    }

    #[tokio::test]
    async fn test_rejected_session() {
        let store = MemoryRemoteStore::new();
        store.set_reject_session(true);
        assert!(matches!(
            store.ensure_session().await.unwrap_err(),
            RemoteError::Auth(_)
        ));
    }

    #[tokio::test]
    async fn test_transport_outage_hits_everything() {
        let store = MemoryRemoteStore::new();
        store.set_fail_transport(true);
        assert!(matches!(
            store.get(RecordPath::Settings).await.unwrap_err(),
            RemoteError::Transport(_)
        ));
        assert!(matches!(
            store.set(RecordPath::Version, json!(1)).await.unwrap_err(),
            RemoteError::Transport(_)
        ));
        assert!(matches!(
            store.ensure_session().await.unwrap_err(),
            RemoteError::Transport(_)
        ));
    }
}
