//! Distro and packaging-flavor classification.
//!
//! Identity markers are probed in a fixed order: an explicit distro-id
//! file always wins over the busybox binary-presence heuristic. When the
//! primary id names a derivative distribution, the like-distro chain maps
//! it onto the closest canonical ecosystem.

use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::fmt;
use std::path::Path;

/// Coarse packaging ecosystem of a container filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Rhel,
    Deb,
    Alpine,
    Busybox,
    Unknown,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Flavor::Rhel => "RHEL",
            Flavor::Deb => "DEB",
            Flavor::Alpine => "ALPINE",
            Flavor::Busybox => "BUSYB",
            Flavor::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Identity of the image's distribution, as read from on-disk markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroMeta {
    pub distro: String,
    pub distro_version: String,
    pub like_distro: String,
}

impl DistroMeta {
    fn unknown() -> Self {
        DistroMeta {
            distro: "Unknown".to_string(),
            distro_version: "0".to_string(),
            like_distro: String::new(),
        }
    }

    /// Map a single distro id onto a flavor, without the like-chain.
    fn flavor_of_id(id: &str) -> Flavor {
        match id {
            "centos" | "rhel" | "redhat" | "fedora" | "ol" | "amzn" => Flavor::Rhel,
            "debian" | "ubuntu" => Flavor::Deb,
            "alpine" => Flavor::Alpine,
            "busybox" => Flavor::Busybox,
            _ => Flavor::Unknown,
        }
    }

    /// Classify this image's packaging flavor. The primary id is
    /// consulted first; a derivative falls through to each member of the
    /// like-distro chain in declaration order.
    pub fn flavor(&self) -> Flavor {
        let primary = Self::flavor_of_id(&self.distro.to_lowercase());
        if primary != Flavor::Unknown {
            return primary;
        }

        for like in self
            .like_distro
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
        {
            let mapped = Self::flavor_of_id(&like.to_lowercase());
            if mapped != Flavor::Unknown {
                return mapped;
            }
        }

        Flavor::Unknown
    }
}

/// Probe a rootfs for distro identity markers.
pub fn detect_distro(rootfs: &Path) -> DistroMeta {
    if let Some(meta) = read_os_release(&rootfs.join("etc/os-release")) {
        return meta;
    }
    if let Some(meta) = read_system_release_cpe(&rootfs.join("etc/system-release-cpe")) {
        return meta;
    }
    if let Some(meta) = read_redhat_release(&rootfs.join("etc/redhat-release")) {
        return meta;
    }
    if let Some(meta) = probe_busybox(&rootfs.join("bin/busybox")) {
        return meta;
    }
    DistroMeta::unknown()
}

fn read_os_release(path: &Path) -> Option<DistroMeta> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_os_release(&content)
}

fn parse_os_release(content: &str) -> Option<DistroMeta> {
    let mut distro = None;
    let mut version = None;
    let mut like = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim_matches('"').to_string();
            match key {
                "ID" => distro = Some(value),
                "VERSION_ID" => version = Some(value),
                "ID_LIKE" => like = Some(value),
                _ => {}
            }
        }
    }

    distro.map(|d| DistroMeta {
        distro: d,
        distro_version: version.unwrap_or_else(|| "0".to_string()),
        like_distro: like.unwrap_or_default(),
    })
}

fn read_system_release_cpe(path: &Path) -> Option<DistroMeta> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_system_release_cpe(&content)
}

/// `cpe:/o:<vendor>:<product>:<version>:...`
fn parse_system_release_cpe(content: &str) -> Option<DistroMeta> {
    let line = content.lines().next()?.trim();
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 5 || fields[0] != "cpe" {
        return None;
    }
    Some(DistroMeta {
        distro: fields[2].to_string(),
        distro_version: fields[4].to_string(),
        like_distro: String::new(),
    })
}

fn read_redhat_release(path: &Path) -> Option<DistroMeta> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_redhat_release(&content)
}

/// `<Name> release <version> ...`
fn parse_redhat_release(content: &str) -> Option<DistroMeta> {
    let re = Regex::new(r"(?i)(\w+) release (\d+(?:\.\d+)*)").ok()?;
    let caps = re.captures(content.lines().next()?)?;
    Some(DistroMeta {
        distro: caps[1].to_lowercase(),
        distro_version: caps[2].to_string(),
        like_distro: String::new(),
    })
}

/// The binary belongs to a foreign image and is never executed; its
/// version banner is recovered by scanning the file contents.
fn probe_busybox(path: &Path) -> Option<DistroMeta> {
    if !path.exists() {
        return None;
    }
    let version = std::fs::read(path)
        .ok()
        .and_then(|bytes| busybox_banner_version(&bytes))
        .unwrap_or_else(|| "0".to_string());

    Some(DistroMeta {
        distro: "busybox".to_string(),
        distro_version: version,
        like_distro: String::new(),
    })
}

fn busybox_banner_version(bytes: &[u8]) -> Option<String> {
    let re = BytesRegex::new(r"BusyBox v(\d+\.\d+\.\d+)").ok()?;
    let caps = re.captures(bytes)?;
    Some(String::from_utf8_lossy(&caps[1]).into_owned())
}
