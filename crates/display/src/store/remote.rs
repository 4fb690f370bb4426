//! The remote store port: path-addressed documents plus change
//! subscriptions.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The five paths of the shared namespace. Every display instance reads and
/// writes the same five documents; there is no per-tenant partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordPath {
    Settings,
    Contacts,
    Gallery,
    Background,
    Version,
}

impl RecordPath {
    /// The four content records, excluding the version marker.
    pub const RECORDS: [Self; 4] = [
        Self::Settings,
        Self::Contacts,
        Self::Gallery,
        Self::Background,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Contacts => "contacts",
            Self::Gallery => "gallery",
            Self::Background => "background",
            Self::Version => "version",
        }
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote store failures.
///
/// Nothing here is fatal to a display: auth failure degrades to local-only,
/// permission denials are logged distinctly and abandoned, transport
/// failures retry naturally at the next tick or mutation.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Session establishment was rejected.
    #[error("remote session rejected: {0}")]
    Auth(String),
    /// The store's rules rejected a read or write.
    #[error("permission denied at {path}: {message}")]
    PermissionDenied { path: RecordPath, message: String },
    /// Network or HTTP failure.
    #[error("remote transport failure: {0}")]
    Transport(String),
    /// The response body was not valid JSON.
    #[error("invalid JSON from remote: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// A live value-changed stream for one path.
///
/// The first delivery is the value current at subscribe time (JSON `null`
/// when the path is empty); later deliveries happen only when the value
/// changes. Dropping the subscription stops any backing task.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Value>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a plain channel (no backing task).
    #[must_use]
    pub const fn from_receiver(rx: mpsc::Receiver<Value>) -> Self {
        Self { rx, task: None }
    }

    /// Wrap a channel fed by a task; the task is aborted on drop.
    #[must_use]
    pub const fn with_task(rx: mpsc::Receiver<Value>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Next delivered value, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Port to the hosted store shared by every display instance.
///
/// Values are raw `serde_json::Value` documents; typed decoding is the
/// coordinator's concern so that one malformed record never poisons the
/// others.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establish (or verify) a remote session. Called once at startup;
    /// failure degrades the display to local-only operation.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Auth`] when the store rejects the session,
    /// [`RemoteError::Transport`] when it cannot be reached.
    async fn ensure_session(&self) -> Result<(), RemoteError>;

    /// Snapshot of the value at `path`; JSON `null` when the path is empty.
    ///
    /// # Errors
    ///
    /// Transport, permission, or decode failure.
    async fn get(&self, path: RecordPath) -> Result<Value, RemoteError>;

    /// Overwrite the whole value at `path`.
    ///
    /// # Errors
    ///
    /// Transport or permission failure.
    async fn set(&self, path: RecordPath, value: Value) -> Result<(), RemoteError>;

    /// Open a value-changed stream for `path`.
    ///
    /// # Errors
    ///
    /// Transport or permission failure while establishing the stream.
    async fn subscribe(&self, path: RecordPath) -> Result<Subscription, RemoteError>;

    /// Fetch the version document the timed poll compares tokens against.
    /// Defaults to a plain read of the version path; HTTP deployments
    /// override this with the cache-busted static document.
    ///
    /// # Errors
    ///
    /// Transport, permission, or decode failure.
    async fn poll_version(&self) -> Result<Value, RemoteError> {
        self.get(RecordPath::Version).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_path_names_match_the_api() {
        assert_eq!(RecordPath::Settings.as_str(), "settings");
        assert_eq!(RecordPath::Version.to_string(), "version");
        assert_eq!(RecordPath::RECORDS.len(), 4);
        assert!(!RecordPath::RECORDS.contains(&RecordPath::Version));
    }

    #[tokio::test]
    async fn test_subscription_from_receiver_delivers() {
        let (tx, rx) = mpsc::channel(2);
        let mut sub = Subscription::from_receiver(rx);
        tx.send(serde_json::json!({"version": 1})).await.unwrap();
        drop(tx);

        assert_eq!(sub.recv().await, Some(serde_json::json!({"version": 1})));
        assert_eq!(sub.recv().await, None);
    }
}
