//! DPKG package enumeration.
//!
//! The status database is queried through `dpkg-query` with a structured,
//! delimiter-separated field format. License detection is a secondary
//! lookup per package against the machine-readable copyright file.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use crate::error::{InventoryError, Result};
use crate::package::{PackageInventory, PackageRecord, PackagingType, FIELD_DELIM};

const ADMIN_DIR: &str = "rootfs/var/lib/dpkg";

pub fn enumerate(unpack_dir: &Path) -> Result<PackageInventory> {
    let admin_dir = unpack_dir.join(ADMIN_DIR);
    if !admin_dir.is_dir() {
        return Err(InventoryError::Enumeration {
            ecosystem: "DPKG",
            details: format!("status database not found at {}", admin_dir.display()),
        }
        .into());
    }

    which::which("dpkg-query").map_err(|_| InventoryError::MissingTool {
        tool: "dpkg-query",
        ecosystem: "DPKG",
    })?;

    let format = [
        "${Package}",
        "${Version}",
        "${Architecture}",
        "${Installed-Size}",
        "${source:Package}-${source:Version}",
        "${Maintainer}",
    ]
    .join(FIELD_DELIM)
        + "\n";

    let output = Command::new("dpkg-query")
        .arg("--admindir")
        .arg(&admin_dir)
        .arg("-W")
        .arg("-f")
        .arg(&format)
        .output()
        .map_err(|e| InventoryError::Enumeration {
            ecosystem: "DPKG",
            details: format!("could not run dpkg-query: {}", e),
        })?;

    if !output.status.success() {
        return Err(InventoryError::Enumeration {
            ecosystem: "DPKG",
            details: format!(
                "dpkg-query exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut inventory = parse_query_output(&stdout, &unpack_dir.join("rootfs"));
    collect_owned_files(&admin_dir.join("info"), &mut inventory.owned_files);

    Ok(inventory)
}

/// Parse delimiter-separated `dpkg-query -W` output into records.
///
/// Installed size arrives in kilobytes and normalizes to bytes as
/// `kb * 1000`; unparsable sizes default to 0, and the number of
/// defaulted entries is surfaced once.
pub(crate) fn parse_query_output(stdout: &str, rootfs: &Path) -> PackageInventory {
    let mut inventory = PackageInventory::default();
    let mut defaulted_sizes = 0usize;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(FIELD_DELIM).collect();
        let &[name, version, arch, size_kb, source, maintainer] = fields.as_slice() else {
            eprintln!("⚠️  Warning: skipping malformed dpkg-query line: {}", line);
            continue;
        };

        let installed_size_bytes = match size_kb.trim().parse::<u64>() {
            Ok(kb) => kb * 1000,
            Err(_) => {
                defaulted_sizes += 1;
                0
            }
        };

        let license = copyright_license(rootfs, name);

        inventory
            .versions
            .insert(name.to_string(), version.to_string());
        inventory.records.insert(
            name.to_string(),
            PackageRecord {
                name: name.to_string(),
                version: version.to_string(),
                release: "N/A".to_string(),
                architecture: arch.to_string(),
                installed_size_bytes,
                license,
                origin: format!("{} (maintainer)", maintainer),
                source_package: source.to_string(),
                packaging_type: PackagingType::Dpkg,
            },
        );
    }

    if defaulted_sizes > 0 {
        eprintln!(
            "⚠️  Warning: {} DPKG package(s) had an unparsable installed size, defaulted to 0",
            defaulted_sizes
        );
    }

    inventory
}

/// Scan `usr/share/doc/<pkg>/copyright` for `License: <token>` lines,
/// aggregating unique tokens in first-seen order.
fn copyright_license(rootfs: &Path, package: &str) -> String {
    let path = rootfs.join("usr/share/doc").join(package).join("copyright");
    let Ok(content) = std::fs::read_to_string(&path) else {
        return "Unknown".to_string();
    };

    let re = Regex::new(r"^License: (\S+)").expect("static pattern");
    let mut licenses: Vec<String> = Vec::new();
    for line in content.lines() {
        if let Some(caps) = re.captures(line.trim()) {
            let lic = caps[1].to_string();
            if !licenses.contains(&lic) {
                licenses.push(lic);
            }
        }
    }

    if licenses.is_empty() {
        "Unknown".to_string()
    } else {
        licenses.join(" ")
    }
}

/// File ownership from the per-package `info/<pkg>.list` files.
fn collect_owned_files(info_dir: &Path, owned: &mut BTreeMap<String, String>) {
    let Ok(entries) = std::fs::read_dir(info_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "list") {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines() {
                let line = line.trim();
                if !line.is_empty() && line != "/." {
                    owned.insert(line.to_string(), "DPKGFILE".to_string());
                }
            }
        }
    }
}
