//! End-to-end test support for Barberboard.
//!
//! Boots the real server (axum over a throwaway data directory) on an
//! ephemeral port inside the test runtime, then wires real display clients
//! to it over HTTP. Nothing external is required; every test is
//! self-contained.
//!
//! # Usage
//!
//! ```rust,ignore
//! let server = TestServer::start().await;
//! let display = TestDisplay::connect(&server, TabChannel::new(), |_| {});
//! display.start().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;

use barberboard_display::config::SyncConfig;
use barberboard_display::notify::LogNotifier;
use barberboard_display::reload::{ReloadHandler, ReloadReason};
use barberboard_display::store::HttpRemoteStore;
use barberboard_display::sync::SyncCoordinator;
use barberboard_display::tabs::TabChannel;
use barberboard_display::watch::VersionWatcher;
use barberboard_server::config::ServerConfig;
use barberboard_server::routes;
use barberboard_server::state::AppState;

/// A real Barberboard server on an ephemeral port over a throwaway data
/// directory. The server task is aborted on drop.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    _data_dir: TempDir,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Boot a server with no admin token configured: every write is
    /// accepted (the bootstrap state).
    pub async fn start() -> Self {
        Self::start_with_token(None).await
    }

    /// Boot a server, optionally seeding an admin token the way the binary
    /// does at startup. Note that seeding bumps the version document once,
    /// so the first record write lands on version 3, not 2.
    pub async fn start_with_token(token: Option<&str>) -> Self {
        let data_dir = tempfile::tempdir().expect("create server data dir");
        let config = ServerConfig {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
            data_dir: data_dir.path().to_path_buf(),
            admin_token: None,
        };
        let state = AppState::new(config).expect("open record store");
        if let Some(token) = token {
            state
                .store()
                .set_admin_token(token.to_string())
                .await
                .expect("seed admin token");
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("read bound address");
        let app = routes::app(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            addr,
            _data_dir: data_dir,
            task,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Captures reload requests delivered to a display shell.
#[derive(Default)]
pub struct ReloadCounter {
    reasons: Mutex<Vec<ReloadReason>>,
}

impl ReloadCounter {
    #[must_use]
    pub fn count(&self) -> usize {
        self.reasons().len()
    }

    #[must_use]
    pub fn reasons(&self) -> Vec<ReloadReason> {
        self.reasons.lock().expect("reload capture lock").clone()
    }
}

impl ReloadHandler for ReloadCounter {
    fn reload(&self, reason: ReloadReason) {
        self.reasons
            .lock()
            .expect("reload capture lock")
            .push(reason);
    }
}

/// One display instance wired to a [`TestServer`] over real HTTP, with its
/// own cache directory and a counting reload handler.
pub struct TestDisplay {
    pub coordinator: SyncCoordinator,
    pub watcher: VersionWatcher,
    pub reloads: Arc<ReloadCounter>,
    data_dir: TempDir,
}

impl TestDisplay {
    /// Build a display against `server`. Timings are tightened so tests
    /// converge in milliseconds; `configure` runs last and can override
    /// anything (an admin token, a slower poll, a real debounce).
    ///
    /// Displays that should behave like separate machines get their own
    /// [`TabChannel`]; same-host instances share one.
    pub fn connect(
        server: &TestServer,
        tabs: TabChannel,
        configure: impl FnOnce(&mut SyncConfig),
    ) -> Self {
        let data_dir = tempfile::tempdir().expect("create display cache dir");
        let mut config = SyncConfig::embedded(data_dir.path());
        config.remote_url = Some(Url::parse(&server.base_url).expect("parse server url"));
        config.poll_interval = Duration::from_millis(100);
        config.reload_debounce = Duration::ZERO;
        config.broadcast_reload_delay = Duration::from_millis(50);
        config.force_update_debounce = Duration::from_millis(20);
        configure(&mut config);

        let remote = HttpRemoteStore::from_config(&config).expect("build remote store");
        let reloads = Arc::new(ReloadCounter::default());
        let coordinator = SyncCoordinator::new(
            config,
            Arc::new(remote),
            Arc::new(LogNotifier),
            reloads.clone(),
            tabs,
        )
        .expect("build coordinator");
        let watcher = VersionWatcher::new(coordinator.clone());

        Self {
            coordinator,
            watcher,
            reloads,
            data_dir,
        }
    }

    /// Bring the display online: pull, subscribe, start the watcher.
    pub async fn start(&self) {
        self.coordinator.start().await;
        self.watcher.start();
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }

    /// The directory backing this display's local cache.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.data_dir.path()
    }
}

/// Poll `check` every 20 ms until it holds or `timeout` elapses.
///
/// # Panics
///
/// Panics when the deadline passes first, naming `what`.
pub async fn wait_for(what: &str, timeout: Duration, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Give the admin token a `SecretString` shape for display configs.
#[must_use]
pub fn secret(token: &str) -> SecretString {
    SecretString::from(token.to_string())
}
