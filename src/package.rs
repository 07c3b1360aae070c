//! Canonical package records and per-flavor enumeration dispatch.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::distro::{DistroMeta, Flavor};
use crate::error::Result;
use crate::{apk, dpkg, rpm};

/// Field delimiter for the structured rpm/dpkg query formats. A plain
/// token that cannot collide with whitespace inside a field value.
pub(crate) const FIELD_DELIM: &str = "|PKGTOK|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingType {
    Rpm,
    Dpkg,
    Apk,
    Busybox,
}

/// One installed package, normalized across ecosystems.
///
/// `release` is the literal `"N/A"` when the source ecosystem has no
/// release concept; `license` is `"Unknown"` when undetermined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub release: String,
    pub architecture: String,
    pub installed_size_bytes: u64,
    pub license: String,
    pub origin: String,
    pub source_package: String,
    pub packaging_type: PackagingType,
}

/// Result collector for one ecosystem's enumeration. The views are
/// merged into artifacts only at emission, so a later producer's failure
/// never discards these.
#[derive(Debug, Default)]
pub struct PackageInventory {
    /// name → full record (`pkgs.allinfo`)
    pub records: BTreeMap<String, PackageRecord>,
    /// name → canonical version string (`pkgs.all`)
    pub versions: BTreeMap<String, String>,
    /// name-plus-source-alias → canonical version (`pkgs_plus_source.all`)
    pub plus_source: BTreeMap<String, String>,
    /// owned path → ownership marker (`pkgfiles.all`)
    pub owned_files: BTreeMap<String, String>,
}

impl PackageInventory {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
            && self.versions.is_empty()
            && self.plus_source.is_empty()
            && self.owned_files.is_empty()
    }
}

/// Run the enumerator matching the detected flavor.
///
/// Enumeration failure for one ecosystem is recoverable: it is logged
/// and yields an empty inventory instead of aborting the pass.
pub fn enumerate_for_flavor(
    flavor: Flavor,
    meta: &DistroMeta,
    unpack_dir: &Path,
) -> PackageInventory {
    match flavor {
        Flavor::Rhel => logged("RPM", rpm::enumerate(unpack_dir)),
        Flavor::Deb => logged("DPKG", dpkg::enumerate(unpack_dir)),
        Flavor::Alpine => logged("APK", apk::enumerate(unpack_dir)),
        Flavor::Busybox => busybox_inventory(meta),
        Flavor::Unknown => PackageInventory::default(),
    }
}

fn logged(ecosystem: &str, result: Result<PackageInventory>) -> PackageInventory {
    match result {
        Ok(inventory) => inventory,
        Err(e) => {
            eprintln!(
                "⚠️  Warning: failed to generate {} package list: {}",
                ecosystem, e
            );
            PackageInventory::default()
        }
    }
}

/// BusyBox images have no package database; the busybox binary itself is
/// the single inventory entry.
fn busybox_inventory(meta: &DistroMeta) -> PackageInventory {
    let mut inventory = PackageInventory::default();
    let record = PackageRecord {
        name: "BusyBox".to_string(),
        version: meta.distro_version.clone(),
        release: "N/A".to_string(),
        architecture: "N/A".to_string(),
        installed_size_bytes: 0,
        license: "Unknown".to_string(),
        origin: "N/A".to_string(),
        source_package: "N/A".to_string(),
        packaging_type: PackagingType::Busybox,
    };
    inventory
        .versions
        .insert(record.name.clone(), record.version.clone());
    inventory.records.insert(record.name.clone(), record);
    inventory
}
