use clap::Parser;
use std::path::PathBuf;

/// Extract a normalized software inventory from an unpacked container filesystem
#[derive(Parser, Debug)]
#[command(name = "rootfs-inventory")]
#[command(version)]
#[command(
    about = "Extract a normalized software inventory from an unpacked container filesystem",
    long_about = None
)]
pub struct Args {
    /// Identifier of the analyzed image, echoed in the startup log
    #[arg(short, long)]
    pub image_id: String,

    /// Unpack directory; must contain the image's 'rootfs' subdirectory
    #[arg(short, long)]
    pub unpack_dir: PathBuf,

    /// Directory receiving the persisted record artifacts
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Scan configuration file (defaults to inventory.config.yml in the
    /// unpack directory when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
