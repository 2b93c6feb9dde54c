//! Version metadata embedded in a component binary.
//!
//! Managed plugin binaries carry a Win32 version resource whose string table
//! stores UTF-16LE key/value pairs. `"Assembly Version"` is the version the
//! component was built as; `"FileVersion"` is the file-level attribute. The
//! probe scans the raw bytes for those keys, so it works on any host OS.

use std::path::Path;

use plugkeep_core::ComponentVersion;

pub const EMBEDDED_VERSION_KEY: &str = "Assembly Version";
pub const FILE_VERSION_KEY: &str = "FileVersion";

/// Longest value we are willing to read after a key, in UTF-16 units.
const MAX_VALUE_UNITS: usize = 64;

/// Reads version metadata out of a binary on disk.
pub trait MetadataProbe: Send + Sync {
    /// Version embedded by the build (source 2).
    fn embedded_version(&self, binary: &Path) -> Option<ComponentVersion>;

    /// File-level version attribute (source 3).
    fn file_version(&self, binary: &Path) -> Option<ComponentVersion>;
}

/// Default probe: scans the version resource string table.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionResourceProbe;

impl MetadataProbe for VersionResourceProbe {
    fn embedded_version(&self, binary: &Path) -> Option<ComponentVersion> {
        let bytes = read_binary(binary)?;
        find_utf16_value(&bytes, EMBEDDED_VERSION_KEY).and_then(|raw| parse_leading_version(&raw))
    }

    fn file_version(&self, binary: &Path) -> Option<ComponentVersion> {
        let bytes = read_binary(binary)?;
        find_utf16_value(&bytes, FILE_VERSION_KEY).and_then(|raw| parse_leading_version(&raw))
    }
}

fn read_binary(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "cannot read binary metadata");
            None
        }
    }
}

/// Encode `s` as UTF-16LE followed by a NUL unit.
fn utf16_key(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Find `key` in a version resource and return the string value after it.
///
/// Layout after the key: NUL terminator, zero padding up to a 32-bit
/// boundary, then the NUL-terminated UTF-16LE value.
pub(crate) fn find_utf16_value(bytes: &[u8], key: &str) -> Option<String> {
    let needle = utf16_key(key);
    let mut from = 0;
    while let Some(offset) = find(&bytes[from..], &needle) {
        let start = from + offset + needle.len();
        if let Some(value) = read_value(bytes, start) {
            return Some(value);
        }
        from = from + offset + 2;
    }
    None
}

fn read_value(bytes: &[u8], mut at: usize) -> Option<String> {
    // Skip alignment padding.
    while at + 1 < bytes.len() && bytes[at] == 0 && bytes[at + 1] == 0 {
        at += 2;
    }
    let mut units = Vec::new();
    while at + 1 < bytes.len() && units.len() < MAX_VALUE_UNITS {
        let unit = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        if unit == 0 {
            break;
        }
        units.push(unit);
        at += 2;
    }
    let value = String::from_utf16(&units).ok()?;
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `"1.2.3.4 (main@abc123)"` → `1.2.3.4`. Comma-separated legacy values
/// (`"1, 2, 3, 4"`) are accepted too.
fn parse_leading_version(raw: &str) -> Option<ComponentVersion> {
    let normalized = raw.replace(", ", ".").replace(',', ".");
    normalized.split_whitespace().next()?.parse().ok()
}
