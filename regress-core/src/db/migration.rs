//! Moving the aggregate between backends and to/from plain JSON files
//!
//! Every function works on whole aggregates: the target is overwritten, never
//! merged.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::traits::DocumentBackend;
use crate::models::AppData;

/// Copies the stored aggregate from one backend to another
///
/// # Returns
/// The number of scripts copied
pub fn migrate(from: &dyn DocumentBackend, to: &dyn DocumentBackend) -> Result<usize> {
    let data = from
        .try_load()
        .with_context(|| format!("Failed to load {} store at {:?}", from.backend_type(), from.path()))?
        .unwrap_or_default();

    to.save(&data)
        .with_context(|| format!("Failed to save {} store at {:?}", to.backend_type(), to.path()))?;

    Ok(data.scripts.len())
}

/// Writes the aggregate as pretty-printed JSON
///
/// An unreadable store is an error rather than an export of the defaults.
pub fn export_to_json<P: AsRef<Path>>(backend: &dyn DocumentBackend, path: P) -> Result<()> {
    let data = backend
        .try_load()
        .with_context(|| format!("Failed to load {} store at {:?}", backend.backend_type(), backend.path()))?
        .unwrap_or_default();
    let json = serde_json::to_string_pretty(&data).context("Failed to serialize data")?;

    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&path, json)
        .with_context(|| format!("Failed to write export to {:?}", path.as_ref()))?;
    Ok(())
}

/// Replaces the stored aggregate with the contents of a JSON file
///
/// Unlike loading, an unreadable file is an error here: silently importing
/// the default aggregate would wipe the store.
pub fn import_from_json<P: AsRef<Path>>(backend: &dyn DocumentBackend, path: P) -> Result<AppData> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path.as_ref()))?;
    let data: AppData = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {:?}", path.as_ref()))?;

    backend.save(&data).context("Failed to save imported data")?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileBackend, SqliteBackend};
    use crate::models::{Folder, Project, Script};
    use tempfile::TempDir;

    fn sample() -> AppData {
        let mut data = AppData::new();
        data.add_folder(Folder::new("Payments", None));
        data.add_script(Script::new("TC-1", "Card auth", "s1", "Payments > Cards"));
        data.add_script(Script::new("TC-2", "Wire limit", "s2", "Payments > Wires"));
        data.add_project(Project::new("Alpha", "user01"));
        data
    }

    #[test]
    fn test_migrate_file_to_sqlite_and_back() {
        let temp_dir = TempDir::new().unwrap();
        let files = FileBackend::new(temp_dir.path().join("files"));
        let sqlite = SqliteBackend::new(temp_dir.path().join("store.db")).unwrap();
        let data = sample();
        files.save(&data).unwrap();

        assert_eq!(migrate(&files, &sqlite).unwrap(), 2);
        assert_eq!(sqlite.load(), data);

        let back = FileBackend::new(temp_dir.path().join("back"));
        migrate(&sqlite, &back).unwrap();
        assert_eq!(back.load(), data);
    }

    #[test]
    fn test_migrate_refuses_corrupt_source() {
        let temp_dir = TempDir::new().unwrap();
        let files = FileBackend::new(temp_dir.path().join("files"));
        files.write_key(crate::db::DATA_KEY, "{broken").unwrap();
        let target = FileBackend::new(temp_dir.path().join("target"));

        assert!(migrate(&files, &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_export_then_import() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileBackend::new(temp_dir.path().join("source"));
        source.save(&sample()).unwrap();
        let export_path = temp_dir.path().join("out").join("export.json");

        export_to_json(&source, &export_path).unwrap();

        let target = FileBackend::new(temp_dir.path().join("target"));
        let imported = import_from_json(&target, &export_path).unwrap();
        assert_eq!(imported, source.load());
        assert_eq!(target.load(), imported);
    }

    #[test]
    fn test_export_refuses_corrupt_store() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileBackend::new(temp_dir.path().join("source"));
        source.write_key(crate::db::DATA_KEY, "{broken").unwrap();
        let export_path = temp_dir.path().join("export.json");

        assert!(export_to_json(&source, &export_path).is_err());
        assert!(!export_path.exists());
    }

    #[test]
    fn test_import_rejects_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let target = FileBackend::new(temp_dir.path().join("target"));

        assert!(import_from_json(&target, &path).is_err());
        assert!(!target.exists());
    }
}
