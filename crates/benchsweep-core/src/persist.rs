//! Crash-consistent JSON artifacts.
//!
//! Writes go to a temporary file in the destination directory, are synced,
//! then atomically renamed over the target. Readers observe either the
//! previous complete file or the new complete file.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SweepError;

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// Every failure maps to [`SweepError::Persistence`].
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SweepError> {
    let fail = |source: std::io::Error| SweepError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(fail)?;

    let content = serde_json::to_vec_pretty(value).map_err(|e| fail(std::io::Error::other(e)))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".benchsweep-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(fail)?;
    tmp.write_all(&content).map_err(fail)?;
    tmp.write_all(b"\n").map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;

    if let Ok(dir_handle) = std::fs::File::open(dir) {
        let _ = dir_handle.sync_all();
    }
    Ok(())
}

/// Read and deserialize a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SweepError> {
    let content = std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| SweepError::json(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut value = BTreeMap::new();
        value.insert("runs".to_string(), 3u32);
        write_json_atomic(&path, &value).unwrap();
        let loaded: BTreeMap<String, u32> = read_json(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn replace_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        write_json_atomic(&path, &1u32).unwrap();
        write_json_atomic(&path, &2u32).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(read_json::<u32>(&path).unwrap(), 2);
    }

    #[test]
    fn unwritable_destination_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // parent "directory" is a regular file
        let err = write_json_atomic(&blocker.join("state.json"), &1u32).unwrap_err();
        assert!(matches!(err, SweepError::Persistence { .. }));
    }

    #[test]
    fn read_missing_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_json::<u32>(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, SweepError::Io { .. }));
    }
}
