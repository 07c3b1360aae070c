//! Recursive Java archive inspection.
//!
//! Candidates are selected by a jar/war/ear final extension, which
//! produces false positives: anything that does not open as a zip
//! container is silently skipped rather than reported. Nested archives
//! are buffered in memory and descended into depth-first, parent before
//! children, with an explicit depth counter bounding the recursion.
//! Container handles are scoped so they are released on every exit path,
//! including mid-parse failures.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::filemanifest::{FileKind, FileManifest};

/// Well-known manifest member of a Java archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Separator between containment levels in an archive location. Makes a
/// nested archive's location unique even when its base name is not.
pub const LOCATION_SEPARATOR: &str = ":";

/// Defensive bound on archive nesting. A zip cannot contain itself, so
/// recursion terminates naturally; this limit guards hostile inputs.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Jar,
    War,
    Ear,
}

/// One record per archive encountered, manifest or not. The `"N/A"`
/// version defaults are part of the output contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub location: String,
    pub archive_type: ArchiveType,
    pub name: String,
    pub specification_version: String,
    pub implementation_version: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

impl ArchiveRecord {
    fn with_defaults(location: &str, archive_type: ArchiveType) -> Self {
        let name = Path::new(location)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        ArchiveRecord {
            location: location.to_string(),
            archive_type,
            name,
            specification_version: "N/A".to_string(),
            implementation_version: "N/A".to_string(),
            origin: "N/A".to_string(),
            manifest: None,
        }
    }
}

/// Classify a path by its final segment's extension.
pub fn archive_type_of(name: &str) -> Option<ArchiveType> {
    match Path::new(name).extension()?.to_str()? {
        "jar" => Some(ArchiveType::Jar),
        "war" => Some(ArchiveType::War),
        "ear" => Some(ArchiveType::Ear),
        _ => None,
    }
}

/// Inspect every archive candidate in the file manifest. Records are
/// keyed by location; a colliding location overwrites the prior entry.
pub fn scan_manifest(
    manifest: &FileManifest,
    rootfs: &Path,
    max_depth: usize,
) -> BTreeMap<String, ArchiveRecord> {
    let mut results = BTreeMap::new();

    for (path, entry) in manifest {
        if entry.kind != FileKind::File {
            continue;
        }
        let Some(archive_type) = archive_type_of(path) else {
            continue;
        };
        let fs_path = rootfs.join(path.trim_start_matches('/'));
        for record in inspect_path(&fs_path, path, archive_type, max_depth) {
            results.insert(record.location.clone(), record);
        }
    }

    results
}

/// Inspect one on-disk candidate. Returns records in depth-first
/// pre-order, parent before children; an unopenable candidate yields
/// no records and no error.
pub fn inspect_path(
    file: &Path,
    location: &str,
    archive_type: ArchiveType,
    max_depth: usize,
) -> Vec<ArchiveRecord> {
    let Ok(handle) = File::open(file) else {
        return Vec::new();
    };
    let Ok(archive) = ZipArchive::new(handle) else {
        return Vec::new();
    };
    inspect_container(archive, location, archive_type, 1, max_depth)
}

fn inspect_container<R: Read + Seek>(
    mut archive: ZipArchive<R>,
    location: &str,
    archive_type: ArchiveType,
    depth: usize,
    max_depth: usize,
) -> Vec<ArchiveRecord> {
    let mut record = ArchiveRecord::with_defaults(location, archive_type);
    if let Some(text) = read_manifest(&mut archive) {
        apply_manifest(&mut record, &text);
        record.manifest = Some(text);
    }

    let mut records = vec![record];

    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    for name in names {
        let Some(child_type) = archive_type_of(&name) else {
            continue;
        };
        if depth >= max_depth {
            eprintln!(
                "⚠️  Warning: archive nesting depth limit ({}) reached at {}; not descending into {}",
                max_depth, location, name
            );
            continue;
        }

        // Buffer the nested entry so it can be opened as a container
        // without materializing it to disk; the entry handle is released
        // at the end of this block on every path.
        let mut buf = Vec::new();
        {
            let Ok(mut child) = archive.by_name(&name) else {
                continue;
            };
            if child.read_to_end(&mut buf).is_err() {
                continue;
            }
        }

        let Ok(child_archive) = ZipArchive::new(Cursor::new(buf)) else {
            continue;
        };
        let child_location = format!("{}{}{}", location, LOCATION_SEPARATOR, name);
        records.extend(inspect_container(
            child_archive,
            &child_location,
            child_type,
            depth + 1,
            max_depth,
        ));
    }

    records
}

fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let mut member = archive.by_name(MANIFEST_PATH).ok()?;
    let mut bytes = Vec::new();
    member.read_to_end(&mut bytes).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse `Key: Value` manifest lines. Origin resolution order is
/// specification vendor, then implementation vendor.
fn apply_manifest(record: &mut ArchiveRecord, text: &str) {
    let mut spec_vendor = None;
    let mut impl_vendor = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        match key {
            "Specification-Version" => record.specification_version = value.trim().to_string(),
            "Implementation-Version" => record.implementation_version = value.trim().to_string(),
            "Specification-Vendor" => spec_vendor = Some(value.trim().to_string()),
            "Implementation-Vendor" => impl_vendor = Some(value.trim().to_string()),
            _ => {}
        }
    }

    if let Some(vendor) = spec_vendor.or(impl_vendor) {
        record.origin = vendor;
    }
}
