//! APK package enumeration.
//!
//! Alpine's installed-package index is a flat, field-prefixed text file,
//! so it is read directly with no external tool. Each record also carries
//! the package's file list, which feeds the shared ownership view.

use regex::Regex;
use std::path::Path;

use crate::error::{InventoryError, Result};
use crate::package::{PackageInventory, PackageRecord, PackagingType};

const INSTALLED_DB: &str = "rootfs/lib/apk/db/installed";

pub fn enumerate(unpack_dir: &Path) -> Result<PackageInventory> {
    let db_path = unpack_dir.join(INSTALLED_DB);
    if !db_path.exists() {
        return Err(InventoryError::Enumeration {
            ecosystem: "APK",
            details: format!("package index not found at {}", db_path.display()),
        }
        .into());
    }

    let content =
        std::fs::read_to_string(&db_path).map_err(|e| InventoryError::Enumeration {
            ecosystem: "APK",
            details: format!("could not read {}: {}", db_path.display(), e),
        })?;

    Ok(parse_installed_index(&content))
}

struct RawPackage {
    name: Option<String>,
    version: String,
    release: String,
    arch: String,
    size: u64,
    license: String,
    origin: String,
    source_package: String,
    files: Vec<String>,
}

impl RawPackage {
    fn fresh() -> Self {
        RawPackage {
            name: None,
            version: "N/A".to_string(),
            release: "N/A".to_string(),
            arch: "N/A".to_string(),
            size: 0,
            license: "Unknown".to_string(),
            origin: "N/A".to_string(),
            source_package: "N/A".to_string(),
            files: Vec::new(),
        }
    }
}

/// Parse the field-prefixed index. Records are blank-line separated;
/// `F` sets the current directory for subsequent `R` file entries.
pub(crate) fn parse_installed_index(content: &str) -> PackageInventory {
    let release_re = Regex::new(r"^(.+)-(r\d+)$").expect("static pattern");

    let mut inventory = PackageInventory::default();
    let mut current = RawPackage::fresh();
    let mut current_dir = String::new();

    for line in content.lines().chain(std::iter::once("")) {
        let line = line.trim_end();
        if line.is_empty() {
            flush(&mut inventory, std::mem::replace(&mut current, RawPackage::fresh()));
            current_dir.clear();
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        match key {
            "P" => current.name = Some(value.to_string()),
            "V" => {
                if let Some(caps) = release_re.captures(value) {
                    current.version = caps[1].to_string();
                    current.release = caps[2].to_string();
                } else {
                    current.version = value.to_string();
                    current.release = "N/A".to_string();
                }
            }
            "A" => current.arch = value.to_string(),
            "I" => current.size = value.parse().unwrap_or(0),
            "L" if !value.is_empty() => current.license = value.to_string(),
            "m" => current.origin = value.to_string(),
            "o" => current.source_package = value.to_string(),
            "F" => current_dir = value.to_string(),
            "R" => current.files.push(format!("/{}/{}", current_dir, value)),
            _ => {}
        }
    }

    inventory
}

fn flush(inventory: &mut PackageInventory, raw: RawPackage) {
    let Some(name) = raw.name else {
        return;
    };

    // Canonical version is `version` or `version-release`.
    let canonical = if raw.release != "N/A" {
        format!("{}-{}", raw.version, raw.release)
    } else {
        raw.version.clone()
    };

    inventory.versions.insert(name.clone(), canonical.clone());

    // Binary names enter the plus-source view unconditionally; a source
    // alias only when it differs and is not already present.
    inventory.plus_source.insert(name.clone(), canonical.clone());
    if raw.source_package != "N/A"
        && raw.source_package != name
        && !inventory.plus_source.contains_key(&raw.source_package)
    {
        inventory
            .plus_source
            .insert(raw.source_package.clone(), canonical);
    }

    for file in &raw.files {
        inventory
            .owned_files
            .insert(file.clone(), "APKFILE".to_string());
    }

    inventory.records.insert(
        name.clone(),
        PackageRecord {
            name,
            version: raw.version,
            release: raw.release,
            architecture: raw.arch,
            installed_size_bytes: raw.size,
            license: raw.license,
            origin: raw.origin,
            source_package: raw.source_package,
            packaging_type: PackagingType::Apk,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "\
P:musl
V:1.2.4-r2
A:x86_64
I:622592
L:MIT
o:musl
m:Timo Teras <timo.teras@iki.fi>
F:lib
R:ld-musl-x86_64.so.1
R:libc.musl-x86_64.so.1

P:alpine-baselayout
V:3.4.3
A:x86_64
I:331776
L:GPL-2.0-only
o:alpine-baselayout
F:etc
R:hosts
";

    #[test]
    fn test_parse_basic_records() {
        let inventory = parse_installed_index(INDEX);
        assert_eq!(inventory.records.len(), 2);

        let musl = &inventory.records["musl"];
        assert_eq!(musl.version, "1.2.4");
        assert_eq!(musl.release, "r2");
        assert_eq!(musl.architecture, "x86_64");
        assert_eq!(musl.installed_size_bytes, 622592);
        assert_eq!(musl.license, "MIT");
        assert_eq!(musl.origin, "Timo Teras <timo.teras@iki.fi>");
        assert_eq!(musl.packaging_type, PackagingType::Apk);
    }

    #[test]
    fn test_canonical_version_with_release() {
        let inventory = parse_installed_index(INDEX);
        assert_eq!(inventory.versions["musl"], "1.2.4-r2");
    }

    #[test]
    fn test_canonical_version_without_release() {
        let inventory = parse_installed_index(INDEX);
        // No `-rN` suffix: version stays unsuffixed, release is "N/A".
        assert_eq!(inventory.versions["alpine-baselayout"], "3.4.3");
        assert_eq!(inventory.records["alpine-baselayout"].release, "N/A");
    }

    #[test]
    fn test_source_identical_to_name_not_aliased() {
        let inventory = parse_installed_index(INDEX);
        // Both packages have o: equal to their own name.
        assert_eq!(inventory.plus_source.len(), 2);
    }

    #[test]
    fn test_source_alias_added_when_different() {
        let index = "\
P:libcrypto3
V:3.1.4-r1
o:openssl
";
        let inventory = parse_installed_index(index);
        assert_eq!(inventory.plus_source["libcrypto3"], "3.1.4-r1");
        assert_eq!(inventory.plus_source["openssl"], "3.1.4-r1");
    }

    #[test]
    fn test_source_alias_first_writer_wins() {
        let index = "\
P:libcrypto3
V:3.1.4-r1
o:openssl

P:libssl3
V:9.9.9-r9
o:openssl
";
        let inventory = parse_installed_index(index);
        assert_eq!(inventory.plus_source["openssl"], "3.1.4-r1");
    }

    #[test]
    fn test_file_ownership_paths() {
        let inventory = parse_installed_index(INDEX);
        assert_eq!(inventory.owned_files["/lib/ld-musl-x86_64.so.1"], "APKFILE");
        assert_eq!(inventory.owned_files["/etc/hosts"], "APKFILE");
    }

    #[test]
    fn test_missing_database_is_enumeration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = enumerate(dir.path());
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("APK"));
        assert!(err.contains("package index not found"));
    }
}
