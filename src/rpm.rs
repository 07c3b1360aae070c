//! RPM package enumeration.
//!
//! RPM database layouts differ across tool versions, so the image's
//! database is copied into a scratch directory and rebuilt with the host
//! tooling before querying; when that fails the legacy on-disk path is
//! queried in place. All queries use a structured, delimiter-separated
//! format, never free text.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::error::{InventoryError, Result};
use crate::package::{PackageInventory, PackageRecord, PackagingType, FIELD_DELIM};

const DB_DIR: &str = "rootfs/var/lib/rpm";

pub fn enumerate(unpack_dir: &Path) -> Result<PackageInventory> {
    let image_db = unpack_dir.join(DB_DIR);
    if !image_db.is_dir() {
        return Err(InventoryError::Enumeration {
            ecosystem: "RPM",
            details: format!("package database not found at {}", image_db.display()),
        }
        .into());
    }

    which::which("rpm").map_err(|_| InventoryError::MissingTool {
        tool: "rpm",
        ecosystem: "RPM",
    })?;

    // The scratch dir must outlive the queries against it.
    let (db_path, _scratch) = prepare_db(&image_db);

    let stdout = run_query(&db_path, &package_query_format())?;
    let mut inventory = parse_query_output(&stdout);

    // File ownership is a second structured query; its failure does not
    // discard the package records already collected.
    match run_query(&db_path, "[%{FILENAMES}\n]") {
        Ok(files_out) => {
            for line in files_out.lines() {
                let line = line.trim();
                if !line.is_empty() && line != "(contains no files)" {
                    inventory
                        .owned_files
                        .insert(line.to_string(), "RPMFILE".to_string());
                }
            }
        }
        Err(e) => {
            eprintln!("⚠️  Warning: failed to get file list from RPMs: {}", e);
        }
    }

    Ok(inventory)
}

fn package_query_format() -> String {
    [
        "%{NAME}",
        "%{VERSION}",
        "%{RELEASE}",
        "%{ARCH}",
        "%{SIZE}",
        "%{LICENSE}",
        "%{SOURCERPM}",
        "%{VENDOR}",
    ]
    .join(FIELD_DELIM)
        + "\n"
}

/// Copy the image database into a scratch directory and rebuild it for
/// the host rpm version. Falls back to the in-place legacy path when any
/// step fails.
fn prepare_db(image_db: &Path) -> (PathBuf, Option<TempDir>) {
    let fallback = (image_db.to_path_buf(), None);

    let Ok(scratch) = TempDir::new() else {
        return fallback;
    };

    if copy_flat_dir(image_db, scratch.path()).is_err() {
        return fallback;
    }

    let rebuilt = Command::new("rpmdb")
        .arg("--dbpath")
        .arg(scratch.path())
        .arg("--rebuilddb")
        .output();

    match rebuilt {
        Ok(output) if output.status.success() => {
            (scratch.path().to_path_buf(), Some(scratch))
        }
        _ => fallback,
    }
}

/// The rpm database directory is flat; subdirectories are not copied.
fn copy_flat_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            std::fs::copy(entry.path(), to.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn run_query(db_path: &Path, format: &str) -> Result<String> {
    let output = Command::new("rpm")
        .arg("--dbpath")
        .arg(db_path)
        .arg("-qa")
        .arg("--queryformat")
        .arg(format)
        .output()
        .map_err(|e| InventoryError::Enumeration {
            ecosystem: "RPM",
            details: format!("could not run rpm: {}", e),
        })?;

    if !output.status.success() {
        return Err(InventoryError::Enumeration {
            ecosystem: "RPM",
            details: format!(
                "rpm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub(crate) fn parse_query_output(stdout: &str) -> PackageInventory {
    let mut inventory = PackageInventory::default();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(FIELD_DELIM).collect();
        let &[name, version, release, arch, size, license, source, vendor] = fields.as_slice()
        else {
            eprintln!("⚠️  Warning: skipping malformed rpm query line: {}", line);
            continue;
        };

        inventory
            .versions
            .insert(name.to_string(), format!("{}-{}", version, release));
        inventory.records.insert(
            name.to_string(),
            PackageRecord {
                name: name.to_string(),
                version: version.to_string(),
                release: release.to_string(),
                architecture: arch.to_string(),
                installed_size_bytes: size.parse().unwrap_or(0),
                license: license.to_string(),
                origin: format!("{} (vendor)", vendor),
                source_package: source.to_string(),
                packaging_type: PackagingType::Rpm,
            },
        );
    }

    inventory
}
