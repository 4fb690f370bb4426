//! Change detection and the reload state machine.
//!
//! Three mechanisms watch for state saved by other displays, and all three
//! are wired even though they overlap; each one covers outages of the
//! others:
//!
//! 1. the live version subscription handed over by the coordinator, for
//!    sub-second convergence while the remote store is reachable,
//! 2. a timed poll of the static version document, which also works
//!    through CDNs and survives a dead subscription,
//! 3. a sweep of the same-host `lastGlobalUpdate` marker, for sibling
//!    processes sharing one cache directory when everything else is down.
//!
//! Version values are opaque tokens compared only for equality: a marker
//! that moves backwards is still a change. The first value each mechanism
//! sees only primes its comparison and never triggers a reload, so a
//! display joining long after the last edit does not reload-loop on
//! startup.
//!
//! Poll and marker reloads go through the coordinator's persisted debounce;
//! subscription reloads fire immediately. Every poll pass publishes its
//! progress on a watch channel (`Idle → Checking → {NoChange |
//! ReloadPending} → Idle`) so shells can surface sync activity and tests
//! can observe outcomes without timing games.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use barberboard_core::version_token;

use crate::reload::ReloadReason;
use crate::store::{Subscription, keys};
use crate::sync::{SyncCoordinator, lock};

/// Where one reconciliation pass currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Fetching the version document and comparing markers.
    Checking,
    /// The pass found nothing new.
    NoChange,
    /// A change was observed and a reload requested (the debounce may
    /// still drop the request).
    ReloadPending,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::NoChange => "no-change",
            Self::ReloadPending => "reload-pending",
        };
        write!(f, "{s}")
    }
}

/// What a poll comparison concluded.
enum Comparison {
    Primed,
    Unchanged,
    Changed,
}

/// Watches for versions saved by other displays and turns them into
/// re-pulls and (debounced) reloads. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct VersionWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    coordinator: SyncCoordinator,
    state: watch::Sender<ReconcileState>,
    // Held so publishing never observes a closed channel
    state_rx: watch::Receiver<ReconcileState>,
    poll_token: Mutex<Option<String>>,
    subscription_primed: AtomicBool,
}

impl VersionWatcher {
    #[must_use]
    pub fn new(coordinator: SyncCoordinator) -> Self {
        let (state, state_rx) = watch::channel(ReconcileState::Idle);
        Self {
            inner: Arc::new(WatcherInner {
                coordinator,
                state,
                state_rx,
                poll_token: Mutex::new(None),
                subscription_primed: AtomicBool::new(false),
            }),
        }
    }

    /// The state most recently published.
    #[must_use]
    pub fn state(&self) -> ReconcileState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to reconciliation state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReconcileState> {
        self.inner.state.subscribe()
    }

    /// Spawn the watch loop. The task is registered with the coordinator
    /// and stops on its shutdown signal. Call after
    /// [`SyncCoordinator::start`]; the live version feed established there
    /// is consumed here.
    pub fn start(&self) {
        let subscription = self.inner.coordinator.take_version_subscription();
        if subscription.is_none() {
            info!("no live version feed, relying on polling");
        }
        let watcher = self.clone();
        let handle = tokio::spawn(watcher.run(subscription));
        self.inner.coordinator.register_task(handle);
    }

    async fn run(self, mut subscription: Option<Subscription>) {
        let mut shutdown = self.inner.coordinator.shutdown_signal();
        let mut ticker = tokio::time::interval(self.inner.coordinator.config().poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                value = next_value(&mut subscription) => match value {
                    Some(value) => self.handle_subscription_value(value).await,
                    None => {
                        debug!("version feed ended, polling only from here");
                        subscription = None;
                    }
                },
            }
        }
        debug!("version watcher stopped");
    }

    /// One reconciliation pass: poll the version document, run the coarse
    /// freshness refresh, sweep the same-host markers. Returns the
    /// published outcome.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> ReconcileState {
        self.publish(ReconcileState::Checking);
        let mut reload_requested = self.poll_pass().await;
        self.coarse_refresh().await;
        reload_requested |= self.marker_sweep().await;
        let outcome = if reload_requested {
            ReconcileState::ReloadPending
        } else {
            ReconcileState::NoChange
        };
        self.publish(outcome);
        self.publish(ReconcileState::Idle);
        outcome
    }

    /// A value arrived on the live version feed. The first delivery mirrors
    /// the snapshot taken at subscribe time and only primes the comparison;
    /// anything different afterwards reloads immediately, bypassing the
    /// debounce.
    async fn handle_subscription_value(&self, value: Value) {
        let token = version_token(&value);
        if !self.inner.subscription_primed.swap(true, Ordering::SeqCst) {
            debug!(token = %token, "version feed primed");
            self.inner.coordinator.record_version_token(token);
            return;
        }
        if self.inner.coordinator.last_seen_version().as_deref() == Some(token.as_str()) {
            return;
        }
        info!(token = %token, "remote version changed, reloading");
        self.inner.coordinator.record_version_token(token);
        self.inner.coordinator.reload_now(ReloadReason::VersionChanged);
    }

    /// Fetch the static version document and compare its token against the
    /// last poll. Fetch failures are logged at debug and skipped; the next
    /// tick tries again. Returns whether a reload was requested.
    async fn poll_pass(&self) -> bool {
        let payload = match self.inner.coordinator.remote().poll_version().await {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "version poll failed, retrying next tick");
                return false;
            }
        };
        let token = version_token(&payload);
        let comparison = {
            let mut last = lock(&self.inner.poll_token);
            match last.as_deref() {
                None => {
                    *last = Some(token.clone());
                    Comparison::Primed
                }
                Some(previous) if previous == token => Comparison::Unchanged,
                Some(_) => {
                    *last = Some(token.clone());
                    Comparison::Changed
                }
            }
        };
        match comparison {
            Comparison::Primed => {
                debug!(token = %token, "version poll primed");
                false
            }
            Comparison::Unchanged => false,
            Comparison::Changed => {
                info!(token = %token, "version document changed, re-syncing");
                if let Err(e) = self.inner.coordinator.pull_records().await {
                    warn!(error = %e, "re-pull after version change failed");
                }
                self.inner
                    .coordinator
                    .reload_debounced(ReloadReason::PollDetected);
                true
            }
        }
    }

    /// The coarse freshness refresh: when the `lastSystemUpdate` marker is
    /// older than the configured horizon, stamp it and re-pull. Data only;
    /// never requests a reload.
    async fn coarse_refresh(&self) {
        let config = self.inner.coordinator.config();
        let horizon =
            i64::try_from(config.coarse_refresh_after.as_millis()).unwrap_or(i64::MAX);
        let now = Utc::now().timestamp_millis();
        let local = self.inner.coordinator.local();
        let last = local.get_millis(keys::LAST_SYSTEM_UPDATE).unwrap_or(0);
        if now.saturating_sub(last) <= horizon {
            return;
        }
        local.set_millis(keys::LAST_SYSTEM_UPDATE, now);
        debug!("coarse refresh");
        if let Err(e) = self.inner.coordinator.pull_records().await {
            debug!(error = %e, "coarse refresh pull failed");
        }
    }

    /// The same-host fallback: a sibling process sharing this cache
    /// directory moved `lastGlobalUpdate`. Catch up to the marker, re-pull,
    /// and request a debounced reload. Returns whether one was requested.
    async fn marker_sweep(&self) -> bool {
        let local = self.inner.coordinator.local();
        let Some(global) = local.get_millis(keys::LAST_GLOBAL_UPDATE) else {
            return false;
        };
        let mine = local.get_millis(keys::MY_LAST_UPDATE).unwrap_or(0);
        if global == mine {
            return false;
        }
        local.set_millis(keys::MY_LAST_UPDATE, global);
        info!(marker = global, "same-host update marker moved, re-syncing");
        if let Err(e) = self.inner.coordinator.pull_records().await {
            warn!(error = %e, "re-pull after marker change failed");
        }
        self.inner
            .coordinator
            .reload_debounced(ReloadReason::LocalMarker);
        true
    }

    fn publish(&self, state: ReconcileState) {
        let _ = self.inner.state.send(state);
    }
}

async fn next_value(subscription: &mut Option<Subscription>) -> Option<Value> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}
