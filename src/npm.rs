//! NPM manifest inspection.
//!
//! Scans the shared file manifest for `package.json` files and
//! normalizes each into a record keyed by the originating path, so
//! unrelated manifests declaring the same package name never collide.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::filemanifest::{FileKind, FileManifest};

const MANIFEST_NAME: &str = "package.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmRecord {
    pub name: String,
    pub versions: Vec<String>,
    pub latest: String,
    pub origins: Vec<String>,
    pub source_url: String,
    pub licenses: Vec<String>,
}

/// Inspect every `package.json` under the rootfs. A malformed manifest
/// is logged and skipped; the remaining scan continues.
pub fn scan_manifest(manifest: &FileManifest, rootfs: &Path) -> BTreeMap<String, NpmRecord> {
    let mut results = BTreeMap::new();

    for (path, entry) in manifest {
        if entry.kind != FileKind::File {
            continue;
        }
        if Path::new(path).file_name() != Some(std::ffi::OsStr::new(MANIFEST_NAME)) {
            continue;
        }

        let fs_path = rootfs.join(path.trim_start_matches('/'));
        let parsed = std::fs::read_to_string(&fs_path)
            .map_err(anyhow::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?));

        match parsed {
            Ok(value) => {
                for record in normalize(&value) {
                    results.insert(path.clone(), record);
                }
            }
            Err(e) => {
                eprintln!(
                    "⚠️  Warning: found {} but cannot parse ({}): {}",
                    MANIFEST_NAME, path, e
                );
            }
        }
    }

    results
}

/// Normalize one parsed manifest. A manifest without a `name` yields no
/// records.
pub(crate) fn normalize(manifest: &Value) -> Vec<NpmRecord> {
    let Some(name) = manifest.get("name").and_then(Value::as_str) else {
        return Vec::new();
    };

    let version = manifest.get("version").and_then(Value::as_str);
    let versions = version.map(|v| vec![v.to_string()]).unwrap_or_default();
    let latest = version.unwrap_or_default().to_string();

    let mut origins = Vec::new();
    if let Some(author) = manifest.get("author").and_then(person_name) {
        origins.push(author);
    }
    for field in ["contributors", "maintainers"] {
        if let Some(people) = manifest.get(field).and_then(Value::as_array) {
            for person in people {
                if let Some(n) = person_name(person) {
                    if !origins.contains(&n) {
                        origins.push(n);
                    }
                }
            }
        }
    }

    let source_url = manifest
        .get("homepage")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            let repo = manifest.get("repository")?;
            repo.as_str()
                .map(str::to_string)
                .or_else(|| Some(repo.get("url")?.as_str()?.to_string()))
        })
        .unwrap_or_default();

    let mut licenses = Vec::new();
    for field in ["license", "licenses"] {
        if let Some(value) = manifest.get(field) {
            collect_licenses(value, &mut licenses);
        }
    }

    vec![NpmRecord {
        name: name.to_string(),
        versions,
        latest,
        origins,
        source_url,
        licenses,
    }]
}

/// `author`-style values are either a plain string or an object with a
/// `name` member.
fn person_name(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| Some(value.get("name")?.as_str()?.to_string()))
}

/// License declarations appear as a string, an object with a `type`
/// member, or an array of either.
fn collect_licenses(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        Value::Object(map) => {
            if let Some(s) = map.get("type").and_then(Value::as_str) {
                if !out.iter().any(|l| l == s) {
                    out.push(s.to_string());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_licenses(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filemanifest;
    use std::fs;
    use tempfile::TempDir;

    fn normalize_str(json: &str) -> Vec<NpmRecord> {
        normalize(&serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_normalize_full_manifest() {
        let records = normalize_str(
            r#"{
                "name": "left-pad",
                "version": "1.3.0",
                "author": { "name": "azer", "email": "azer@example.com" },
                "homepage": "https://github.com/stevemao/left-pad",
                "license": "WTFPL"
            }"#,
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "left-pad");
        assert_eq!(record.versions, vec!["1.3.0"]);
        assert_eq!(record.latest, "1.3.0");
        assert_eq!(record.origins, vec!["azer"]);
        assert_eq!(record.source_url, "https://github.com/stevemao/left-pad");
        assert_eq!(record.licenses, vec!["WTFPL"]);
    }

    #[test]
    fn test_normalize_without_name_yields_nothing() {
        let records = normalize_str(r#"{ "version": "1.0.0" }"#);
        assert!(records.is_empty());
    }

    #[test]
    fn test_author_as_plain_string() {
        let records = normalize_str(r#"{ "name": "p", "author": "Jane Doe <jd@example.com>" }"#);
        assert_eq!(records[0].origins, vec!["Jane Doe <jd@example.com>"]);
    }

    #[test]
    fn test_license_object_and_array_forms() {
        let records = normalize_str(
            r#"{
                "name": "p",
                "licenses": [ { "type": "MIT" }, "Apache-2.0", { "type": "MIT" } ]
            }"#,
        );
        assert_eq!(records[0].licenses, vec!["MIT", "Apache-2.0"]);
    }

    #[test]
    fn test_repository_url_fallback() {
        let records = normalize_str(
            r#"{
                "name": "p",
                "repository": { "type": "git", "url": "git://github.com/x/p.git" }
            }"#,
        );
        assert_eq!(records[0].source_url, "git://github.com/x/p.git");
    }

    #[test]
    fn test_scan_keys_by_originating_path() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        fs::create_dir_all(rootfs.join("app/node_modules/a")).unwrap();
        fs::create_dir_all(rootfs.join("srv/node_modules/a")).unwrap();

        // Two unrelated manifests declaring the same package name.
        fs::write(
            rootfs.join("app/node_modules/a/package.json"),
            r#"{ "name": "dupe", "version": "1.0.0" }"#,
        )
        .unwrap();
        fs::write(
            rootfs.join("srv/node_modules/a/package.json"),
            r#"{ "name": "dupe", "version": "2.0.0" }"#,
        )
        .unwrap();

        let manifest = filemanifest::build(&rootfs).unwrap();
        let results = scan_manifest(&manifest, &rootfs);
        assert_eq!(results.len(), 2);
        assert_eq!(results["/app/node_modules/a/package.json"].latest, "1.0.0");
        assert_eq!(results["/srv/node_modules/a/package.json"].latest, "2.0.0");
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let dir = TempDir::new().unwrap();
        let rootfs = dir.path().join("rootfs");
        fs::create_dir_all(rootfs.join("good")).unwrap();
        fs::create_dir_all(rootfs.join("bad")).unwrap();
        fs::write(
            rootfs.join("good/package.json"),
            r#"{ "name": "ok", "version": "0.1.0" }"#,
        )
        .unwrap();
        fs::write(rootfs.join("bad/package.json"), "{ not json").unwrap();

        let manifest = filemanifest::build(&rootfs).unwrap();
        let results = scan_manifest(&manifest, &rootfs);
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("/good/package.json"));
    }
}
