//! Display background image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single background image record, or absent when the display uses the
/// built-in gradient.
///
/// Like gallery images the `src` is a data URL or plain URL. A candidate
/// larger than [`Background::MAX_BYTES`] is rejected before it ever reaches
/// a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub src: String,
    pub name: String,
    /// Source file size in bytes.
    pub size: u64,
    pub upload_date: DateTime<Utc>,
}

impl Background {
    /// Largest accepted source file, in bytes (5 MiB).
    pub const MAX_BYTES: u64 = 5 * 1024 * 1024;

    /// Build a record stamped with the current time.
    ///
    /// Returns `None` when the file exceeds [`Self::MAX_BYTES`].
    #[must_use]
    pub fn new(src: impl Into<String>, name: impl Into<String>, size: u64) -> Option<Self> {
        if size > Self::MAX_BYTES {
            return None;
        }
        Some(Self {
            src: src.into(),
            name: name.into(),
            size,
            upload_date: Utc::now(),
        })
    }
}
