//! Shared file-manifest cache.
//!
//! The rootfs is walked exactly once per pass. The resulting mapping is
//! persisted under the unpack directory so later inspectors in the same
//! pass, and later passes over the same unpacked image, skip the walk
//! entirely. The artifact carries no checksum of the rootfs: if the
//! rootfs is re-unpacked the cache must be deleted by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{InventoryError, Result};

/// Cache artifact name, scoped to the unpack directory.
pub const CACHE_FILENAME: &str = "allfiles.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Metadata for one path under the rootfs. Symlinks are recorded without
/// being followed, so a cyclic or escaping link can never extend the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifestEntry {
    pub path: String,
    pub kind: FileKind,
    pub mode: u32,
    pub size: u64,
}

/// Path → entry mapping for every distinct path in a rootfs.
pub type FileManifest = BTreeMap<String, FileManifestEntry>;

/// Load the persisted manifest if one exists, otherwise walk the rootfs
/// and persist the result before returning it.
///
/// A present-but-corrupt cache is an error rather than a silent rebuild:
/// the caller decides whether to delete the artifact and retry.
pub fn load_or_build(unpack_dir: &Path) -> Result<FileManifest> {
    let cache_path = unpack_dir.join(CACHE_FILENAME);

    if cache_path.exists() {
        let content =
            std::fs::read_to_string(&cache_path).map_err(|e| InventoryError::ManifestCache {
                path: cache_path.clone(),
                details: e.to_string(),
            })?;
        let manifest: FileManifest =
            serde_json::from_str(&content).map_err(|e| InventoryError::ManifestCache {
                path: cache_path.clone(),
                details: e.to_string(),
            })?;
        return Ok(manifest);
    }

    let manifest = build(&unpack_dir.join("rootfs"))?;

    // Persisting is best-effort: a read-only unpack directory still scans.
    match serde_json::to_string(&manifest) {
        Ok(encoded) => {
            if let Err(e) = std::fs::write(&cache_path, encoded) {
                eprintln!(
                    "⚠️  Warning: could not persist file manifest cache {}: {}",
                    cache_path.display(),
                    e
                );
            }
        }
        Err(e) => {
            eprintln!("⚠️  Warning: could not encode file manifest cache: {}", e);
        }
    }

    Ok(manifest)
}

/// Walk a rootfs and record every entry, including special files.
pub fn build(rootfs: &Path) -> Result<FileManifest> {
    if !rootfs.is_dir() {
        return Err(InventoryError::RootfsNotFound {
            path: rootfs.to_path_buf(),
        }
        .into());
    }

    let mut manifest = FileManifest::new();

    for entry in WalkDir::new(rootfs).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                eprintln!("⚠️  Warning: skipping unreadable path during walk: {}", e);
                continue;
            }
        };

        let rel = match entry.path().strip_prefix(rootfs) {
            Ok(r) => format!("/{}", r.to_string_lossy()),
            Err(_) => continue,
        };

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                eprintln!(
                    "⚠️  Warning: skipping {} (metadata unreadable): {}",
                    rel, e
                );
                continue;
            }
        };

        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };

        manifest.insert(
            rel.clone(),
            FileManifestEntry {
                path: rel,
                kind,
                mode: meta.mode(),
                size: meta.size(),
            },
        );
    }

    Ok(manifest)
}

/// Select entries carrying the setuid bit, mapped to their four-digit
/// octal permission string.
pub fn suid_files(manifest: &FileManifest) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (path, entry) in manifest {
        if entry.mode & 0o4000 != 0 {
            out.insert(path.clone(), format!("{:04o}", entry.mode & 0o7777));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fixture_rootfs(unpack: &Path) {
        let rootfs = unpack.join("rootfs");
        fs::create_dir_all(rootfs.join("usr/bin")).unwrap();
        fs::write(rootfs.join("usr/bin/tool"), b"#!/bin/sh\n").unwrap();
        fs::write(rootfs.join("readme"), b"hello").unwrap();
        std::os::unix::fs::symlink("usr/bin/tool", rootfs.join("link")).unwrap();
    }

    #[test]
    fn test_build_records_all_kinds() {
        let dir = TempDir::new().unwrap();
        fixture_rootfs(dir.path());

        let manifest = build(&dir.path().join("rootfs")).unwrap();
        assert_eq!(manifest["/usr/bin/tool"].kind, FileKind::File);
        assert_eq!(manifest["/usr/bin"].kind, FileKind::Directory);
        assert_eq!(manifest["/link"].kind, FileKind::Symlink);
        assert_eq!(manifest["/readme"].size, 5);
    }

    #[test]
    fn test_build_missing_rootfs() {
        let dir = TempDir::new().unwrap();
        let result = build(&dir.path().join("rootfs"));
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("rootfs not found"));
    }

    #[test]
    fn test_load_or_build_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fixture_rootfs(dir.path());

        let first = load_or_build(dir.path()).unwrap();
        let second = load_or_build(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_is_reused_without_rewalking() {
        let dir = TempDir::new().unwrap();
        fixture_rootfs(dir.path());

        let first = load_or_build(dir.path()).unwrap();

        // Mutate the rootfs after the cache exists; the stale cache must
        // be returned verbatim, proving the walk was skipped.
        fs::write(dir.path().join("rootfs/new-file"), b"x").unwrap();
        let second = load_or_build(dir.path()).unwrap();
        assert_eq!(first, second);
        assert!(!second.contains_key("/new-file"));
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        fixture_rootfs(dir.path());
        fs::write(dir.path().join(CACHE_FILENAME), b"not json").unwrap();

        let result = load_or_build(dir.path());
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("file manifest cache"));
    }

    #[test]
    fn test_suid_files() {
        let dir = TempDir::new().unwrap();
        fixture_rootfs(dir.path());
        let suid_path = dir.path().join("rootfs/usr/bin/tool");
        fs::set_permissions(&suid_path, fs::Permissions::from_mode(0o4755)).unwrap();

        let manifest = build(&dir.path().join("rootfs")).unwrap();
        let suids = suid_files(&manifest);
        assert_eq!(suids.len(), 1);
        assert_eq!(suids["/usr/bin/tool"], "4755");
    }

    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        fs::create_dir_all(rootfs.join("dir")).unwrap();
        // A cyclic link back to the rootfs itself must terminate the walk.
        std::os::unix::fs::symlink("..", rootfs.join("dir/up")).unwrap();

        let manifest = build(&rootfs).unwrap();
        assert_eq!(manifest["/dir/up"].kind, FileKind::Symlink);
        assert!(manifest.len() < 10);
    }
}
