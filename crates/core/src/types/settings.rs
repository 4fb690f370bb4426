//! Shop settings record.

use serde::{Deserialize, Serialize};

/// Errors raised when validating a settings save.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The shop name is empty or whitespace.
    #[error("shop name cannot be empty")]
    EmptyName,
    /// The subtitle is empty or whitespace.
    #[error("shop subtitle cannot be empty")]
    EmptySubtitle,
    /// `chairCount` fell below 1.
    #[error("chair count must be at least 1")]
    ChairCountTooSmall,
    /// `maxWaiting` left the 1..=100 range.
    #[error("max waiting must be between {min} and {max}", min = ShopSettings::MIN_WAITING, max = ShopSettings::MAX_WAITING)]
    MaxWaitingOutOfRange,
}

/// The singleton shop settings record.
///
/// ## Invariants
///
/// After a successful [`validate`](Self::validate)d save, `chair_count >= 1`
/// and `max_waiting` is within `1..=100`. Values applied from the remote
/// store are trusted as-is (the writer validated them); only local saves
/// re-check.
///
/// Serialized field names match the legacy JSON document:
/// `{"name", "subtitle", "chairCount", "maxWaiting"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopSettings {
    pub name: String,
    pub subtitle: String,
    pub chair_count: u32,
    pub max_waiting: u32,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            name: "صالون الحلاقة الملكي".to_owned(),
            subtitle: "أفضل خدمات الحلاقة والتجميل".to_owned(),
            chair_count: 3,
            max_waiting: 20,
        }
    }
}

impl ShopSettings {
    /// Lower bound for `max_waiting`.
    pub const MIN_WAITING: u32 = 1;
    /// Upper bound for `max_waiting`.
    pub const MAX_WAITING: u32 = 100;

    /// Check the save-time invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: empty name/subtitle,
    /// `chair_count` below 1, or `max_waiting` outside 1..=100.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.name.trim().is_empty() {
            return Err(SettingsError::EmptyName);
        }
        if self.subtitle.trim().is_empty() {
            return Err(SettingsError::EmptySubtitle);
        }
        if self.chair_count < 1 {
            return Err(SettingsError::ChairCountTooSmall);
        }
        if self.max_waiting < Self::MIN_WAITING || self.max_waiting > Self::MAX_WAITING {
            return Err(SettingsError::MaxWaitingOutOfRange);
        }
        Ok(())
    }

    /// Overlay a partial remote document onto this value.
    ///
    /// Remote settings documents are merged field-wise: a document that only
    /// carries `{"name": …}` updates the name and leaves everything else
    /// alone, so partial writes from older deployments cannot blank newer
    /// fields.
    pub fn apply_patch(&mut self, patch: SettingsPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(subtitle) = patch.subtitle {
            self.subtitle = subtitle;
        }
        if let Some(chair_count) = patch.chair_count {
            self.chair_count = chair_count;
        }
        if let Some(max_waiting) = patch.max_waiting {
            self.max_waiting = max_waiting;
        }
    }
}

/// A partial settings document, as read from the remote store.
///
/// Every field is optional; see [`ShopSettings::apply_patch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub name: Option<String>,
    pub subtitle: Option<String>,
    pub chair_count: Option<u32>,
    pub max_waiting: Option<u32>,
}
