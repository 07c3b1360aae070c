//! rootfs-inventory - software inventory extraction for unpacked
//! container filesystems.
//!
//! This library recognizes multiple packaging ecosystems (RPM, DPKG, APK,
//! a BusyBox fallback, NPM manifests, and Java archive manifests) in an
//! already-unpacked container rootfs and reduces each to a common
//! package-record shape, including records discovered recursively inside
//! nested archives.
//!
//! # Architecture
//!
//! - [`filemanifest`]: one walk of the rootfs, cached on disk and shared
//!   read-only by every inspector in the pass
//! - [`distro`]: packaging-flavor classification from on-disk markers
//! - [`package`] + [`rpm`] / [`dpkg`] / [`apk`]: per-ecosystem package
//!   enumerators behind one closed dispatch
//! - [`java`]: recursive Java archive inspection
//! - [`npm`]: `package.json` manifest inspection
//! - [`kvfile`]: the persisted key-value record artifact
//!
//! # Example
//!
//! ```no_run
//! use rootfs_inventory::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<()> {
//! let unpack_dir = Path::new("/var/lib/unpacked/image");
//! let rootfs = unpack_dir.join("rootfs");
//!
//! // Classify the image and enumerate its native packages.
//! let meta = detect_distro(&rootfs);
//! let inventory = enumerate_for_flavor(meta.flavor(), &meta, unpack_dir);
//!
//! // Inspect archives against the shared file manifest.
//! let manifest = load_or_build(unpack_dir)?;
//! let archives = scan_archives(&manifest, &rootfs, DEFAULT_MAX_DEPTH);
//!
//! write_kvfile_records(Path::new("pkgs.allinfo"), &inventory.records)?;
//! write_kvfile_records(Path::new("pkgs.java"), &archives)?;
//! # Ok(())
//! # }
//! ```

pub mod apk;
pub mod config;
pub mod distro;
pub mod dpkg;
pub mod error;
pub mod filemanifest;
pub mod java;
pub mod kvfile;
pub mod npm;
pub mod package;
pub mod rpm;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ConfigFile;
    pub use crate::distro::{detect_distro, DistroMeta, Flavor};
    pub use crate::error::{ExitCode, InventoryError, Result};
    pub use crate::filemanifest::{
        load_or_build, suid_files, FileKind, FileManifest, FileManifestEntry,
    };
    pub use crate::java::{scan_manifest as scan_archives, ArchiveRecord, DEFAULT_MAX_DEPTH};
    pub use crate::kvfile::{write_kvfile, write_kvfile_records};
    pub use crate::npm::{scan_manifest as scan_npm_manifests, NpmRecord};
    pub use crate::package::{
        enumerate_for_flavor, PackageInventory, PackageRecord, PackagingType,
    };
}
