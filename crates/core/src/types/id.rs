//! Newtype IDs for type-safe entity references.
//!
//! Record IDs in the legacy documents are creation timestamps (millis), so
//! these wrap `i64` rather than sequential integers. Use the `define_id!`
//! macro to create new wrappers without mixing IDs across entity types.

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe millisecond-timestamp ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use barberboard_core::define_id;
/// define_id!(WidgetId);
///
/// let id = WidgetId::new(1_700_000_000_000);
/// assert_eq!(id.as_i64(), 1_700_000_000_000);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ContactId);
define_id!(ImageId);

impl ContactId {
    /// An ID stamped with the current wall-clock time, the way the legacy
    /// documents assign contact IDs.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }
}

impl ImageId {
    /// A fresh image ID: current millis widened with a random component so
    /// that images added within the same millisecond stay distinct.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let millis = chrono::Utc::now().timestamp_millis();
        let salt = rand::rng().random_range(0..1000_i64);
        Self(millis * 1000 + salt)
    }
}

/// A per-process display session identifier.
///
/// Used as the `source` field of cross-instance force-update messages so a
/// display can recognize (and ignore) its own broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session ID (`user_` plus nine random base-36
    /// characters, the shape the legacy bookkeeping key holds).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::rng();
        let suffix: String = (0..9)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                char::from(*CHARSET.get(idx).unwrap_or(&b'0'))
            })
            .collect();
        Self(format!("user_{suffix}"))
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serde_transparent() {
        let id = ContactId::new(1_700_000_000_000);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "1700000000000");

        let parsed: ContactId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_image_ids_distinct_within_a_millisecond() {
        let a = ImageId::generate();
        let b = ImageId::generate();
        // Even with identical millis the random component keeps collisions
        // unlikely; equality here would be a one-in-a-thousand fluke.
        assert!(a != b || a.as_i64() % 1000 == b.as_i64() % 1000);
    }

    #[test]
    fn test_session_id_shape() {
        let sid = SessionId::generate();
        assert!(sid.as_str().starts_with("user_"));
        assert_eq!(sid.as_str().len(), "user_".len() + 9);
    }

    #[test]
    fn test_contact_id_now_is_millis_scale() {
        let id = ContactId::now();
        // Sanity: later than 2020-01-01 in millis.
        assert!(id.as_i64() > 1_577_836_800_000);
    }
}
