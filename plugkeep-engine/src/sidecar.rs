//! Sidecar version record: binds a claimed version to the bytes it describes.
//!
//! Persists `<version>|<sha256-hex>` as a single UTF-8 line at
//! `<install_dir>/<Component>.version`. The record is only trusted when the
//! stored hash equals the SHA-256 of the binary currently on disk, so a
//! binary swapped in by anything other than this engine is never
//! mis-described by a stale record.
//!
//! Writes use the same `.tmp` + rename pattern as the config file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use plugkeep_core::{ComponentLayout, ComponentVersion};

use crate::error::{io_err, EngineError};

const READ_CHUNK: usize = 64 * 1024;

/// A parsed sidecar line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: ComponentVersion,
    pub sha256: String,
}

impl VersionRecord {
    pub fn to_line(&self) -> String {
        format!("{}|{}", self.version, self.sha256)
    }
}

/// What the sidecar said about the binary, after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarStatus {
    /// Hash matches the binary on disk; the version is authoritative.
    Trusted(ComponentVersion),
    /// No sidecar file.
    Absent,
    /// Single-field record from an older release of this tool.
    Legacy,
    /// Well-formed, but describes different bytes.
    HashMismatch,
    /// Two fields, but the version part does not parse.
    Unparsable,
    /// The sidecar or binary could not be read.
    Unreadable(String),
}

impl SidecarStatus {
    pub fn trusted_version(&self) -> Option<ComponentVersion> {
        match self {
            SidecarStatus::Trusted(version) => Some(*version),
            _ => None,
        }
    }
}

/// Stream a file through SHA-256 and return the lowercase hex digest.
pub fn hash_file(path: &Path) -> Result<String, EngineError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(path, e)),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Read and verify the sidecar for `layout`.
///
/// Never fails: every problem is folded into a non-`Trusted` status so the
/// caller can fall through to binary metadata.
pub fn read_verified(layout: &ComponentLayout) -> SidecarStatus {
    let path = layout.sidecar_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return SidecarStatus::Absent,
        Err(e) => return SidecarStatus::Unreadable(io_err(&path, e).to_string()),
    };

    let parts: Vec<&str> = contents.trim().split('|').collect();
    let [version, stored_hash] = parts.as_slice() else {
        return SidecarStatus::Legacy;
    };

    let current_hash = match hash_file(&layout.binary_path()) {
        Ok(hash) => hash,
        Err(e) => return SidecarStatus::Unreadable(e.to_string()),
    };

    if !stored_hash.trim().eq_ignore_ascii_case(&current_hash) {
        return SidecarStatus::HashMismatch;
    }

    match version.parse::<ComponentVersion>() {
        Ok(version) => SidecarStatus::Trusted(version),
        Err(_) => SidecarStatus::Unparsable,
    }
}

/// Hash the current binary and write `<version>|<hash>` atomically,
/// replacing any previous record.
pub fn write_for(
    layout: &ComponentLayout,
    version: ComponentVersion,
) -> Result<VersionRecord, EngineError> {
    let record = VersionRecord {
        version,
        sha256: hash_file(&layout.binary_path())?,
    };

    let path = layout.sidecar_path();
    let tmp = path.with_extension("version.tmp");
    std::fs::write(&tmp, record.to_line()).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(record)
}
