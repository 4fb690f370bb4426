//! Change-detection markers.
//!
//! A version marker is an opaque token compared for equality with the last
//! value a client saw. Markers are never ordered: a poller that sees a
//! *different* token re-pulls, whether the number went up or down.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A numeric marker written next to mutations so other displays notice the
/// change. Writers stamp the current time in milliseconds; the server's
/// bump endpoint increments instead. Both work because readers only compare
/// for equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionMarker(i64);

impl VersionMarker {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// A marker stamped with the current Unix-millisecond time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for VersionMarker {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Extract the comparison token from a polled version document.
///
/// Prefers a `version` field, then `updatedAt`, then the whole payload
/// rendered as JSON, so a document of any of the historical shapes still
/// yields a token that changes when the document changes.
#[must_use]
pub fn version_token(payload: &Value) -> String {
    for key in ["version", "updatedAt"] {
        if let Some(field) = payload.get(key) {
            if !field.is_null() {
                return render(field);
            }
        }
    }
    payload.to_string()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marker_is_serde_transparent() {
        let marker = VersionMarker::new(1_700_000_000_000);
        assert_eq!(serde_json::to_string(&marker).unwrap(), "1700000000000");
        let back: VersionMarker = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(back, marker);
    }

    #[test]
    fn test_token_prefers_version_field() {
        let payload = json!({"version": 7, "updatedAt": "2024-01-01T00:00:00Z"});
        assert_eq!(version_token(&payload), "7");
    }

    #[test]
    fn test_string_version_is_unquoted() {
        assert_eq!(version_token(&json!({"version": "v12"})), "v12");
    }

    #[test]
    fn test_token_falls_back_to_updated_at() {
        let payload = json!({"updatedAt": "2024-01-01T00:00:00Z", "settings": {}});
        assert_eq!(version_token(&payload), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_null_version_falls_through() {
        let payload = json!({"version": null, "updatedAt": "later"});
        assert_eq!(version_token(&payload), "later");
    }

    #[test]
    fn test_bare_payload_is_its_own_token() {
        let a = json!({"settings": {"name": "A"}});
        let b = json!({"settings": {"name": "B"}});
        assert_eq!(version_token(&a), version_token(&a.clone()));
        assert_ne!(version_token(&a), version_token(&b));
    }
}
