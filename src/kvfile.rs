//! Persisted record artifact ("kv-file") framing.
//!
//! Every inspector converges on this emitter: one `<key>\t<value>` line
//! per record, keys unique within one file, no cross-line ordering
//! guarantee consumed downstream (lines are written in key order as a
//! side effect of the map type).

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{InventoryError, Result};

/// Write a map of already-stringified values as a kv-file.
pub fn write_kvfile(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let mut buf = String::new();
    for (k, v) in entries {
        buf.push_str(k);
        buf.push('\t');
        buf.push_str(v);
        buf.push('\n');
    }

    std::fs::write(path, buf).map_err(|e| InventoryError::ArtifactWrite {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    Ok(())
}

/// Write a map of records, serializing each value independently to a
/// self-describing JSON encoding before framing.
pub fn write_kvfile_records<T: Serialize>(
    path: &Path,
    records: &BTreeMap<String, T>,
) -> Result<()> {
    let mut entries = BTreeMap::new();
    for (k, v) in records {
        let encoded = serde_json::to_string(v).map_err(|e| InventoryError::ArtifactWrite {
            path: path.to_path_buf(),
            details: format!("record '{}' could not be serialized: {}", k, e),
        })?;
        entries.insert(k.clone(), encoded);
    }
    write_kvfile(path, &entries)
}

/// Read a kv-file back into a map. Lines without a tab are skipped.
pub fn read_kvfile(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| InventoryError::ArtifactWrite {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    let mut entries = BTreeMap::new();
    for line in content.lines() {
        if let Some((k, v)) = line.split_once('\t') {
            entries.insert(k.to_string(), v.to_string());
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Record {
        version: String,
        release: String,
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pkgs.all");

        let mut entries = BTreeMap::new();
        entries.insert("bash".to_string(), "5.1-2".to_string());
        entries.insert("zlib".to_string(), "1.2.13".to_string());

        write_kvfile(&path, &entries).unwrap();
        let back = read_kvfile(&path).unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn test_record_values_parse_as_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pkgs.allinfo");

        let mut records = BTreeMap::new();
        records.insert(
            "bash".to_string(),
            Record {
                version: "5.1".to_string(),
                release: "2".to_string(),
            },
        );

        write_kvfile_records(&path, &records).unwrap();

        let back = read_kvfile(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&back["bash"]).unwrap();
        assert_eq!(value["version"], "5.1");
        assert_eq!(value["release"], "2");
    }

    #[test]
    fn test_lines_are_tab_separated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analyzer_meta");

        let mut entries = BTreeMap::new();
        entries.insert("DISTRO".to_string(), "alpine".to_string());
        write_kvfile(&path, &entries).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "DISTRO\talpine\n");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let result = write_kvfile(
            Path::new("/nonexistent/outputdir/pkgs.all"),
            &BTreeMap::new(),
        );
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("Failed to write artifact"));
    }
}
