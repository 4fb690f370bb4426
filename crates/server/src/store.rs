//! JSON-file record store.
//!
//! Storage is exactly what the displays poll over HTTP: the version
//! document `settings-version.json` (shop settings live inside it, next to
//! the version marker and the admin token), one file per list record
//! (`contacts.json`, `gallery.json`), and `background.json`, present only
//! while a background is set.
//!
//! Writes are serialized through a single lock and land through a
//! temp-file rename. Reads always go to disk, so sibling server processes
//! pointed at the same directory observe each other's writes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// The version document; the static poll target of every display.
pub const VERSION_DOC_FILE: &str = "settings-version.json";
/// The contact list record.
pub const CONTACTS_FILE: &str = "contacts.json";
/// The gallery list record.
pub const GALLERY_FILE: &str = "gallery.json";
/// The background record.
pub const BACKGROUND_FILE: &str = "background.json";

/// Storage failures. Reads never produce these (missing or malformed
/// records serve their defaults); only writes do.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("record failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The version document.
///
/// `version` stays a raw JSON value: it is normally an integer, but
/// clients may write arbitrary numbers and old documents survive with
/// whatever they carried. Unknown fields round-trip through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDoc {
    #[serde(default = "initial_version")]
    pub version: Value,
    #[serde(default = "now_iso")]
    pub updated_at: String,
    #[serde(default = "empty_object")]
    pub settings: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for VersionDoc {
    fn default() -> Self {
        Self {
            version: initial_version(),
            updated_at: now_iso(),
            settings: empty_object(),
            admin_token: None,
            extra: Map::new(),
        }
    }
}

impl VersionDoc {
    /// Advance the marker: an integer version increments, anything else is
    /// replaced by epoch seconds. Touches `updatedAt`. Returns the new
    /// marker.
    pub fn bump(&mut self) -> Value {
        self.version = match self.version.as_i64() {
            Some(n) => Value::from(n.saturating_add(1)),
            None => Value::from(Utc::now().timestamp()),
        };
        self.updated_at = now_iso();
        self.version.clone()
    }

    /// Overwrite the marker with a client-chosen value (the displays write
    /// now-millis here). Touches `updatedAt`.
    pub fn set_version(&mut self, value: Value) {
        self.version = value;
        self.updated_at = now_iso();
    }

    /// The document as served to clients: the admin token never leaves the
    /// server.
    #[must_use]
    pub fn redacted(mut self) -> Self {
        self.admin_token = None;
        self
    }
}

fn initial_version() -> Value {
    Value::from(1)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Outcome of a background write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundWrite {
    /// The record was replaced; carries the new version marker.
    Replaced(Value),
    /// The record was deleted; carries the new version marker.
    Cleared(Value),
}

/// File-backed record store over one data directory.
pub struct DocStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DocStore {
    /// Open (creating if needed) the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The version document; a fresh default when missing or unusable.
    pub async fn version_doc(&self) -> VersionDoc {
        let raw = self.read_value(VERSION_DOC_FILE, Value::Null).await;
        if raw.is_null() {
            return VersionDoc::default();
        }
        serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!(error = %e, "version document unusable, starting fresh");
            VersionDoc::default()
        })
    }

    pub async fn settings(&self) -> Value {
        self.version_doc().await.settings
    }

    pub async fn contacts(&self) -> Value {
        self.read_value(CONTACTS_FILE, json!([])).await
    }

    pub async fn gallery(&self) -> Value {
        self.read_value(GALLERY_FILE, json!([])).await
    }

    pub async fn background(&self) -> Value {
        self.read_value(BACKGROUND_FILE, Value::Null).await
    }

    pub async fn version(&self) -> Value {
        self.version_doc().await.version
    }

    /// The stored admin token; `None` while unset (the bootstrap state).
    pub async fn admin_token(&self) -> Option<String> {
        self.version_doc()
            .await
            .admin_token
            .filter(|token| !token.is_empty())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace the settings inside the version document and bump. The body
    /// may wrap the object in a `settings` key; non-objects store as `{}`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub async fn put_settings(&self, body: Value) -> Result<Value, StoreError> {
        let settings = unwrap_key(body, "settings");
        let settings = if settings.is_object() {
            settings
        } else {
            empty_object()
        };
        let _guard = self.write_lock.lock().await;
        let mut doc = self.version_doc().await;
        doc.settings = settings;
        let version = doc.bump();
        self.write_json(VERSION_DOC_FILE, &doc).await?;
        Ok(version)
    }

    /// Replace the contact list (`{contacts: […]}` or a bare list) and
    /// bump. Returns the stored element count and the new marker.
    ///
    /// # Errors
    ///
    /// Returns an error when a record cannot be written.
    pub async fn put_contacts(&self, body: Value) -> Result<(usize, Value), StoreError> {
        self.replace_list(CONTACTS_FILE, unwrap_key(body, "contacts"))
            .await
    }

    /// Replace the gallery (`{images: […]}` or a bare list) and bump.
    /// Returns the stored element count and the new marker.
    ///
    /// # Errors
    ///
    /// Returns an error when a record cannot be written.
    pub async fn put_gallery(&self, body: Value) -> Result<(usize, Value), StoreError> {
        self.replace_list(GALLERY_FILE, unwrap_key(body, "images"))
            .await
    }

    /// Replace or clear the background. A truthy `clear` in the body
    /// deletes the record; any other body is stored whole. Bumps either
    /// way.
    ///
    /// # Errors
    ///
    /// Returns an error when a record cannot be written.
    pub async fn put_background(&self, body: Value) -> Result<BackgroundWrite, StoreError> {
        let clear = body.get("clear").is_some_and(truthy);
        let _guard = self.write_lock.lock().await;
        if clear {
            match tokio::fs::remove_file(self.path(BACKGROUND_FILE)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(error = %e, "background removal failed, continuing"),
            }
            let version = self.bump_locked().await?;
            return Ok(BackgroundWrite::Cleared(version));
        }
        self.write_json(BACKGROUND_FILE, &body).await?;
        let version = self.bump_locked().await?;
        Ok(BackgroundWrite::Replaced(version))
    }

    /// Overwrite the version marker (no increment) and touch `updatedAt`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub async fn set_version(&self, value: Value) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.version_doc().await;
        doc.set_version(value);
        let version = doc.version.clone();
        self.write_json(VERSION_DOC_FILE, &doc).await?;
        Ok(version)
    }

    /// Store a new admin token and bump so clients notice.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be written.
    pub async fn set_admin_token(&self, token: String) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.version_doc().await;
        doc.admin_token = Some(token);
        let version = doc.bump();
        self.write_json(VERSION_DOC_FILE, &doc).await?;
        Ok(version)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    async fn read_value(&self, file: &str, default: Value) -> Value {
        match tokio::fs::read(self.path(file)).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!(file, error = %e, "malformed record, serving default");
                    default
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => default,
            Err(e) => {
                warn!(file, error = %e, "record unreadable, serving default");
                default
            }
        }
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = self.path(&format!("{file}.tmp"));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.path(file)).await?;
        Ok(())
    }

    async fn replace_list(&self, file: &str, value: Value) -> Result<(usize, Value), StoreError> {
        let items = match value {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        let count = items.len();
        let _guard = self.write_lock.lock().await;
        self.write_json(file, &Value::Array(items)).await?;
        let version = self.bump_locked().await?;
        Ok((count, version))
    }

    /// Bump the version document. Caller must hold the writer lock.
    async fn bump_locked(&self) -> Result<Value, StoreError> {
        let mut doc = self.version_doc().await;
        let version = doc.bump();
        self.write_json(VERSION_DOC_FILE, &doc).await?;
        Ok(version)
    }
}

/// `{key: inner}` unwraps to `inner`; any other shape passes through
/// whole. Clients send both wrapped and bare record bodies.
pub(crate) fn unwrap_key(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// JSON truthiness as the legacy server evaluated it: null, false, zero,
/// and empty strings/arrays/objects are falsy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DocStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let (_dir, store) = store();
        assert_eq!(store.settings().await, json!({}));
        assert_eq!(store.contacts().await, json!([]));
        assert_eq!(store.gallery().await, json!([]));
        assert_eq!(store.background().await, Value::Null);
        assert_eq!(store.version().await, json!(1));
        assert_eq!(store.admin_token().await, None);
    }

    #[tokio::test]
    async fn test_put_settings_bumps_and_persists() {
        let (_dir, store) = store();
        let version = store
            .put_settings(json!({"settings": {"name": "صالون"}}))
            .await
            .unwrap();
        assert_eq!(version, json!(2));
        assert_eq!(store.settings().await, json!({"name": "صالون"}));

        let doc = store.version_doc().await;
        assert_eq!(doc.version, json!(2));
        assert!(!doc.updated_at.is_empty());
    }

    #[tokio::test]
    async fn test_put_settings_accepts_bare_object() {
        let (_dir, store) = store();
        store.put_settings(json!({"name": "بدون غلاف"})).await.unwrap();
        assert_eq!(store.settings().await, json!({"name": "بدون غلاف"}));
    }

    #[tokio::test]
    async fn test_put_settings_coerces_non_object() {
        let (_dir, store) = store();
        store.put_settings(json!([1, 2, 3])).await.unwrap();
        assert_eq!(store.settings().await, json!({}));
    }

    #[tokio::test]
    async fn test_put_contacts_counts_and_bumps() {
        let (_dir, store) = store();
        let (count, version) = store
            .put_contacts(json!({"contacts": [{"type": "phone", "value": "123"}]}))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(version, json!(2));
        assert_eq!(
            store.contacts().await,
            json!([{"type": "phone", "value": "123"}])
        );
    }

    #[tokio::test]
    async fn test_put_contacts_non_list_coerces_to_empty() {
        let (_dir, store) = store();
        let (count, _) = store
            .put_contacts(json!({"contacts": {"not": "a list"}}))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.contacts().await, json!([]));
    }

    #[tokio::test]
    async fn test_put_gallery_unwraps_images_key() {
        let (_dir, store) = store();
        let (count, _) = store
            .put_gallery(json!({"images": [{"id": 1}, {"id": 2}]}))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_background_replace_then_clear() {
        let (_dir, store) = store();
        let outcome = store
            .put_background(json!({"data": "base64", "uploadDate": "اليوم"}))
            .await
            .unwrap();
        assert_eq!(outcome, BackgroundWrite::Replaced(json!(2)));
        assert_eq!(
            store.background().await,
            json!({"data": "base64", "uploadDate": "اليوم"})
        );

        let outcome = store.put_background(json!({"clear": true})).await.unwrap();
        assert_eq!(outcome, BackgroundWrite::Cleared(json!(3)));
        assert_eq!(store.background().await, Value::Null);
    }

    #[tokio::test]
    async fn test_clearing_missing_background_still_bumps() {
        let (_dir, store) = store();
        let outcome = store.put_background(json!({"clear": 1})).await.unwrap();
        assert_eq!(outcome, BackgroundWrite::Cleared(json!(2)));
    }

    #[tokio::test]
    async fn test_set_version_overwrites_without_increment() {
        let (_dir, store) = store();
        let version = store.set_version(json!(1_700_000_000_123_i64)).await.unwrap();
        assert_eq!(version, json!(1_700_000_000_123_i64));
        assert_eq!(store.version().await, json!(1_700_000_000_123_i64));

        // A client-written marker is still an integer, so it increments
        store.put_settings(json!({})).await.unwrap();
        assert_eq!(store.version().await, json!(1_700_000_000_124_i64));
    }

    #[tokio::test]
    async fn test_bump_replaces_non_integer_with_epoch_seconds() {
        let (_dir, store) = store();
        store.set_version(json!("not-a-number")).await.unwrap();

        let before = Utc::now().timestamp();
        let version = store.put_settings(json!({})).await.unwrap();
        assert!(version.as_i64().unwrap() >= before);
    }

    #[tokio::test]
    async fn test_admin_token_set_and_bump() {
        let (_dir, store) = store();
        let version = store.set_admin_token("secret".to_string()).await.unwrap();
        assert_eq!(version, json!(2));
        assert_eq!(store.admin_token().await, Some("secret".to_string()));
    }

    #[tokio::test]
    async fn test_empty_admin_token_reads_as_unset() {
        let (_dir, store) = store();
        store.set_admin_token(String::new()).await.unwrap();
        assert_eq!(store.admin_token().await, None);
    }

    #[tokio::test]
    async fn test_redacted_doc_drops_token_only() {
        let (_dir, store) = store();
        store.put_settings(json!({"name": "X"})).await.unwrap();
        store.set_admin_token("secret".to_string()).await.unwrap();

        let doc = store.version_doc().await.redacted();
        assert_eq!(doc.admin_token, None);
        assert_eq!(doc.settings, json!({"name": "X"}));
        let serialized = serde_json::to_string(&doc).unwrap();
        assert!(!serialized.contains("adminToken"));
        assert!(!serialized.contains("secret"));
    }

    #[tokio::test]
    async fn test_unknown_doc_fields_survive_writes() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join(VERSION_DOC_FILE),
            r#"{"version": 5, "updatedAt": "x", "settings": {}, "legacyField": "kept"}"#,
        )
        .unwrap();

        store.put_settings(json!({"name": "جديد"})).await.unwrap();

        let raw: Value = serde_json::from_slice(
            &std::fs::read(dir.path().join(VERSION_DOC_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["legacyField"], json!("kept"));
        assert_eq!(raw["version"], json!(6));
    }

    #[tokio::test]
    async fn test_malformed_doc_serves_defaults() {
        let (dir, store) = store();
        std::fs::write(dir.path().join(VERSION_DOC_FILE), b"{not json").unwrap();
        assert_eq!(store.version().await, json!(1));
        assert_eq!(store.settings().await, json!({}));
    }

    #[test]
    fn test_unwrap_key() {
        assert_eq!(
            unwrap_key(json!({"settings": {"a": 1}}), "settings"),
            json!({"a": 1})
        );
        assert_eq!(
            unwrap_key(json!({"other": 1}), "settings"),
            json!({"other": 1})
        );
        assert_eq!(unwrap_key(json!([1, 2]), "contacts"), json!([1, 2]));
    }

    #[test]
    fn test_truthy_matches_legacy_rules() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!({})));
        assert!(!truthy(&json!([])));
    }
}
