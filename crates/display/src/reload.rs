//! Full-reload seam and the persisted reload debounce.

use std::time::Duration;

use tracing::info;

use crate::store::{LocalStore, keys};

/// Why a reload was requested. Passed through to the handler so shells and
/// tests can tell the mechanisms apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    /// The remote version subscription delivered a changed marker.
    VersionChanged,
    /// The timed poll observed a changed version token.
    PollDetected,
    /// The local `lastGlobalUpdate` marker moved.
    LocalMarker,
    /// A force-update broadcast arrived from another instance.
    ForceUpdate,
}

/// What "full reload" means is the display shell's decision; the sync
/// subsystem only signals that one is due.
pub trait ReloadHandler: Send + Sync {
    fn reload(&self, reason: ReloadReason);
}

/// Default handler: logs the request and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReloadHandler;

impl ReloadHandler for LogReloadHandler {
    fn reload(&self, reason: ReloadReason) {
        info!(?reason, "full reload requested");
    }
}

/// The persisted reload debounce.
///
/// Debounced reload paths (the timed poll and the local-marker watcher)
/// consult the `lastFullReload` marker and fire at most once per window.
/// The marker lives in the local store so restarts and same-host instances
/// share one gate. Subscription and force-update reloads bypass the gate.
#[derive(Debug, Clone, Copy)]
pub struct ReloadGate {
    window: Duration,
}

impl ReloadGate {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Whether a debounced reload may fire at `now_millis`. Stamps the
    /// marker when it may; a denied request leaves the marker alone so the
    /// next observed change can try again.
    pub fn permit(&self, local: &LocalStore, now_millis: i64) -> bool {
        let last = local.get_millis(keys::LAST_FULL_RELOAD).unwrap_or(0);
        let window = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        if now_millis.saturating_sub(last) < window {
            return false;
        }
        local.set_millis(keys::LAST_FULL_RELOAD, now_millis);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_opens_then_closes_for_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        let gate = ReloadGate::new(Duration::from_secs(30));

        assert!(gate.permit(&local, 100_000));
        assert!(!gate.permit(&local, 100_000 + 29_999));
        assert!(gate.permit(&local, 100_000 + 30_000));
    }

    #[test]
    fn test_denied_request_does_not_extend_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        let gate = ReloadGate::new(Duration::from_secs(30));

        assert!(gate.permit(&local, 0));
        // Denied attempts inside the window must not push the deadline out
        assert!(!gate.permit(&local, 10_000));
        assert!(!gate.permit(&local, 20_000));
        assert!(gate.permit(&local, 30_000));
    }

    #[test]
    fn test_fresh_store_permits_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        let gate = ReloadGate::new(Duration::from_secs(30));
        assert!(gate.permit(&local, 5));
    }
}
