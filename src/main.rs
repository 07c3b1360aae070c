mod cli;

use anyhow::Context;
use cli::Args;
use rootfs_inventory::config::{self, ConfigFile};
use rootfs_inventory::error::{ExitCode, Result};
use rootfs_inventory::{distro, filemanifest, java, kvfile, npm, package};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process;

fn main() {
    let args = Args::parse_args();

    if let Err(e) = run(&args) {
        eprintln!("\n❌ An error occurred:\n");
        eprintln!("{}", e);

        // Display error chain
        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("\nCaused by: {}", err);
            source = err.source();
        }

        eprintln!();
        process::exit(ExitCode::ApplicationError.as_i32());
    }

    process::exit(ExitCode::Success.as_i32());
}

fn run(args: &Args) -> Result<()> {
    validate_unpack_dir(&args.unpack_dir)?;
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;

    let config = match &args.config {
        Some(path) => config::load_config_from_path(path)?,
        None => config::discover_config(&args.unpack_dir)?.unwrap_or_default(),
    };

    let rootfs = args.unpack_dir.join("rootfs");

    // Image identity first: downstream stages key everything off it.
    let meta = distro::detect_distro(&rootfs);
    let flavor = meta.flavor();
    eprintln!(
        "analyzer starting up: imageId={} distro={} version={} flavor={}",
        args.image_id, meta.distro, meta.distro_version, flavor
    );

    emit_analyzer_meta(args, &meta)?;
    copy_dockerfile(&args.unpack_dir, &args.output_dir);

    if !config.skips("packages") {
        let inventory = package::enumerate_for_flavor(flavor, &meta, &args.unpack_dir);
        emit_records(&args.output_dir.join("pkgs.allinfo"), &inventory.records);
        emit_plain(&args.output_dir.join("pkgs.all"), &inventory.versions);
        emit_plain(
            &args.output_dir.join("pkgs_plus_source.all"),
            &inventory.plus_source,
        );
        emit_plain(&args.output_dir.join("pkgfiles.all"), &inventory.owned_files);
    }

    run_manifest_inspectors(args, &config, &rootfs);

    Ok(())
}

/// The java/npm/suid inspectors share the file manifest. Its
/// unavailability is fatal to them alone; package enumeration has
/// already contributed its records by the time this runs.
fn run_manifest_inspectors(args: &Args, config: &ConfigFile, rootfs: &Path) {
    let want_java = !config.skips("java");
    let want_npm = !config.skips("npm");
    let want_suids = !config.skips("suids");
    if !(want_java || want_npm || want_suids) {
        return;
    }

    if !config.reuse_file_cache() {
        let _ = std::fs::remove_file(args.unpack_dir.join(filemanifest::CACHE_FILENAME));
    }

    let manifest = match filemanifest::load_or_build(&args.unpack_dir) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!(
                "⚠️  Warning: file manifest unavailable, skipping archive/npm/suid inspection: {}",
                e
            );
            return;
        }
    };

    if want_java {
        let archives = java::scan_manifest(&manifest, rootfs, config.max_archive_depth());
        emit_records(&args.output_dir.join("pkgs.java"), &archives);
    }
    if want_npm {
        let npms = npm::scan_manifest(&manifest, rootfs);
        emit_records(&args.output_dir.join("pkgs.npms"), &npms);
    }
    if want_suids {
        let suids = filemanifest::suid_files(&manifest);
        emit_plain(&args.output_dir.join("files.suids"), &suids);
    }
}

fn emit_analyzer_meta(args: &Args, meta: &distro::DistroMeta) -> Result<()> {
    let like = if meta.like_distro.is_empty() {
        meta.distro.clone()
    } else {
        meta.like_distro.clone()
    };

    let mut entries = BTreeMap::new();
    entries.insert("DISTRO".to_string(), meta.distro.clone());
    entries.insert("DISTROVERS".to_string(), meta.distro_version.clone());
    entries.insert("LIKEDISTRO".to_string(), like);

    let artifact = args.output_dir.join("analyzer_meta");
    kvfile::write_kvfile(&artifact, &entries)?;

    // Mirror into the unpack directory for sibling tooling in the same
    // pass; best-effort.
    if let Err(e) = std::fs::copy(&artifact, args.unpack_dir.join("analyzer_meta")) {
        eprintln!(
            "⚠️  Warning: could not mirror analyzer_meta into the unpack directory: {}",
            e
        );
    }

    Ok(())
}

fn copy_dockerfile(unpack_dir: &Path, output_dir: &Path) {
    let dockerfile = unpack_dir.join("Dockerfile");
    if dockerfile.exists() {
        if let Err(e) = std::fs::copy(&dockerfile, output_dir.join("Dockerfile")) {
            eprintln!("⚠️  Warning: could not copy Dockerfile: {}", e);
        }
    }
}

/// Records already collected are never discarded by a failed write of a
/// sibling artifact: emission warns and moves on.
fn emit_records<T: Serialize>(path: &Path, records: &BTreeMap<String, T>) {
    if records.is_empty() {
        return;
    }
    if let Err(e) = kvfile::write_kvfile_records(path, records) {
        eprintln!("⚠️  Warning: {}", e);
    }
}

fn emit_plain(path: &Path, entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        return;
    }
    if let Err(e) = kvfile::write_kvfile(path, entries) {
        eprintln!("⚠️  Warning: {}", e);
    }
}

fn validate_unpack_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(
            "Unpack directory does not exist: {}\n\n💡 Hint: the image must be unpacked before inventory extraction runs",
            path.display()
        );
    }
    if !path.is_dir() {
        anyhow::bail!("Unpack path is not a directory: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_unpack_dir_valid() {
        let dir = TempDir::new().unwrap();
        assert!(validate_unpack_dir(dir.path()).is_ok());
    }

    #[test]
    fn test_validate_unpack_dir_nonexistent() {
        let result = validate_unpack_dir(Path::new("/nonexistent/unpack/dir"));
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn test_validate_unpack_dir_file_not_directory() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("a-file");
        fs::write(&file_path, "content").unwrap();

        let result = validate_unpack_dir(&file_path);
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("not a directory"));
    }
}
