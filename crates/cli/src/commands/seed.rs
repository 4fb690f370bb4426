//! Seed a server data directory with default records.
//!
//! Writes the records a fresh shop starts from: the default shop settings
//! inside a version-1 document, an empty contact list, and an empty
//! gallery. The server serves these shapes as defaults anyway when files
//! are missing; seeding makes them real files an operator can edit.

use std::path::Path;

use serde_json::{Value, json};
use tracing::info;

use barberboard_core::ShopSettings;
use barberboard_server::store::{CONTACTS_FILE, GALLERY_FILE, VERSION_DOC_FILE, VersionDoc};

/// Write default records into `data_dir`, refusing to overwrite an
/// existing version document unless `force` is set.
pub fn run(data_dir: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let doc_path = data_dir.join(VERSION_DOC_FILE);
    if doc_path.exists() && !force {
        return Err(format!(
            "{} already exists (pass --force to overwrite)",
            doc_path.display()
        )
        .into());
    }

    let doc = VersionDoc {
        settings: serde_json::to_value(ShopSettings::default())?,
        ..VersionDoc::default()
    };
    write_pretty(&doc_path, &serde_json::to_value(&doc)?)?;
    write_pretty(&data_dir.join(CONTACTS_FILE), &json!([]))?;
    write_pretty(&data_dir.join(GALLERY_FILE), &json!([]))?;

    info!(data_dir = %data_dir.display(), "seeded default records");
    Ok(())
}

fn write_pretty(path: &Path, value: &Value) -> std::io::Result<()> {
    std::fs::write(path, serde_json::to_vec_pretty(value)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_writes_all_records() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), false).unwrap();

        let doc: VersionDoc = serde_json::from_slice(
            &std::fs::read(dir.path().join(VERSION_DOC_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(doc.version, json!(1));
        assert_eq!(
            doc.settings,
            serde_json::to_value(ShopSettings::default()).unwrap()
        );

        let contacts: Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(CONTACTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(contacts, json!([]));
    }

    #[test]
    fn test_seed_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), false).unwrap();
        assert!(run(dir.path(), false).is_err());
        assert!(run(dir.path(), true).is_ok());
    }
}
