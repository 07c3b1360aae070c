//! Configuration file support for rootfs-inventory.
//!
//! Provides YAML-based scan configuration through `inventory.config.yml`
//! files, including data structures, file loading, and validation.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::java;

const CONFIG_FILENAME: &str = "inventory.config.yml";

/// Inspectors that may be disabled by name.
pub const INSPECTOR_NAMES: &[&str] = &["packages", "java", "npm", "suids"];

/// Top-level configuration file schema.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Reuse a persisted file-manifest cache from an earlier pass.
    /// Disable when the rootfs may have been re-unpacked since.
    pub reuse_file_cache: Option<bool>,
    pub max_archive_depth: Option<usize>,
    pub skip_inspectors: Option<Vec<String>>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

impl ConfigFile {
    pub fn reuse_file_cache(&self) -> bool {
        self.reuse_file_cache.unwrap_or(true)
    }

    pub fn max_archive_depth(&self) -> usize {
        self.max_archive_depth.unwrap_or(java::DEFAULT_MAX_DEPTH)
    }

    pub fn skips(&self, inspector: &str) -> bool {
        self.skip_inspectors
            .as_ref()
            .map(|skips| skips.iter().any(|s| s == inspector))
            .unwrap_or(false)
    }
}

/// Load config from an explicit path. Returns an error if the file is not found.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\n💡 Hint: Check that the file exists and is readable.",
            path.display()
        )
    })?;

    let config: ConfigFile = serde_yaml_ng::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file: {}\n\n💡 Hint: Ensure the file contains valid YAML syntax.",
            path.display()
        )
    })?;

    validate_config(&config)?;
    warn_unknown_fields(&config);

    Ok(config)
}

/// Auto-discover config in the unpack directory. Returns `None` silently
/// if not found.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let config = load_config_from_path(&config_path)?;
    Ok(Some(config))
}

/// Validate the loaded configuration.
fn validate_config(config: &ConfigFile) -> Result<()> {
    if let Some(depth) = config.max_archive_depth {
        if depth == 0 {
            bail!(
                "Invalid config: max_archive_depth must be at least 1.\n\n\
                 💡 Hint: use 1 to inspect top-level archives without descending into nested ones."
            );
        }
    }

    if let Some(ref skips) = config.skip_inspectors {
        for name in skips {
            if !INSPECTOR_NAMES.contains(&name.as_str()) {
                bail!(
                    "Invalid config: unknown inspector '{}' in skip_inspectors.\n\n\
                     💡 Hint: valid names are: {}.",
                    name,
                    INSPECTOR_NAMES.join(", ")
                );
            }
        }
    }

    Ok(())
}

/// Warn about unknown fields in the config file.
fn warn_unknown_fields(config: &ConfigFile) {
    for key in config.unknown_fields.keys() {
        eprintln!(
            "⚠️  Warning: Unknown config field '{}' will be ignored.",
            key
        );
    }
}
