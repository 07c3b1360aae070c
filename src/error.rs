use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Result with anyhow::Error as the error type.
/// This provides a consistent error handling pattern across the codebase.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Exit codes for the CLI application.
///
/// These codes allow CI systems to distinguish between different
/// types of failures and successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success - the pass completed, possibly with partial inventories
    Success = 0,
    /// Application error (unusable unpack directory, artifact write failure, etc.)
    ApplicationError = 1,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::ApplicationError => write!(f, "Application Error (1)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
        }
    }
}

/// Application-specific errors for inventory extraction.
///
/// Uses thiserror to derive Display and Error traits automatically.
/// Enumeration failures and unreadable caches are recoverable at the
/// pass level: the affected inspector contributes zero records while
/// sibling inspectors keep running.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("rootfs not found: {path}\n\n💡 Hint: the unpack directory must contain a 'rootfs' subdirectory produced by the image unpacker")]
    RootfsNotFound { path: PathBuf },

    #[error("Failed to read file manifest cache: {path}\nDetails: {details}\n\n💡 Hint: delete the cache artifact to force a fresh filesystem walk")]
    ManifestCache { path: PathBuf, details: String },

    #[error("Failed to enumerate {ecosystem} packages: {details}")]
    Enumeration {
        ecosystem: &'static str,
        details: String,
    },

    #[error("Required tool '{tool}' was not found on PATH\n\n💡 Hint: install '{tool}' so the {ecosystem} package database can be queried")]
    MissingTool {
        tool: &'static str,
        ecosystem: &'static str,
    },

    #[error("Failed to write artifact: {path}\nDetails: {details}\n\n💡 Hint: verify that the output directory exists and you have write permissions")]
    ArtifactWrite { path: PathBuf, details: String },
}
