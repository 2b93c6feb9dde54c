//! Version resolution and the update decision.
//!
//! `local` is what the bytes on disk are (sidecar → embedded → file
//! attribute); `live` is what the host has loaded in memory. The decision
//! uses `effective = local ?? live` and only consults `live` on its own to
//! spot an update that was written but not yet picked up.

use std::path::Path;

use serde::Serialize;

use plugkeep_core::{ComponentLayout, ComponentName, ComponentVersion};

use crate::host::HostRuntime;
use crate::probe::MetadataProbe;
use crate::sidecar::{self, SidecarStatus};

/// Which signal produced the local version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Sidecar,
    Embedded,
    FileAttribute,
    Unknown,
}

/// Result of resolving the on-disk version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersion {
    pub version: Option<ComponentVersion>,
    pub source: VersionSource,
    pub sidecar: SidecarStatus,
}

/// Resolve the version of the binary on disk.
pub fn resolve_local(layout: &ComponentLayout, probe: &dyn MetadataProbe) -> LocalVersion {
    let status = sidecar::read_verified(layout);
    let binary = layout.binary_path();
    log_sidecar_status(layout.name(), &binary, &status);

    if let Some(version) = status.trusted_version() {
        return LocalVersion {
            version: Some(version),
            source: VersionSource::Sidecar,
            sidecar: status,
        };
    }

    let (version, source) = if let Some(v) = probe.embedded_version(&binary) {
        (Some(v), VersionSource::Embedded)
    } else if let Some(v) = probe.file_version(&binary) {
        (Some(v), VersionSource::FileAttribute)
    } else {
        (None, VersionSource::Unknown)
    };

    LocalVersion {
        version,
        source,
        sidecar: status,
    }
}

fn log_sidecar_status(name: &ComponentName, binary: &Path, status: &SidecarStatus) {
    match status {
        SidecarStatus::Trusted(_) | SidecarStatus::Absent => {}
        SidecarStatus::Legacy => tracing::warn!(
            component = %name,
            binary = %binary.display(),
            "legacy sidecar without hash; ignoring it",
        ),
        SidecarStatus::HashMismatch | SidecarStatus::Unparsable => tracing::warn!(
            component = %name,
            binary = %binary.display(),
            "sidecar hash mismatch or invalid version; ignoring it",
        ),
        SidecarStatus::Unreadable(err) => tracing::warn!(
            component = %name,
            error = %err,
            "cannot check sidecar",
        ),
    }
}

/// Version the host reports for the loaded instance of `name`.
///
/// Any host failure, missing entry, or unparsable version is `None`.
pub fn resolve_live(host: &dyn HostRuntime, name: &ComponentName) -> Option<ComponentVersion> {
    let loaded = match host.loaded_components() {
        Ok(loaded) => loaded,
        Err(err) => {
            tracing::debug!(component = %name, error = %err, "live version unavailable");
            return None;
        }
    };

    loaded
        .iter()
        .find(|c| {
            Path::new(&c.install_dir_name)
                .file_name()
                .and_then(|n| n.to_str())
                == Some(name.0.as_str())
        })
        .and_then(|c| c.reported_version.parse().ok())
}

/// What to do with a component after comparing versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Remote is newer, or the installed version is unknown.
    UpdateDue,
    /// The file is current but the host still runs an older instance.
    PendingRestart {
        live: ComponentVersion,
        file: ComponentVersion,
    },
    UpToDate(ComponentVersion),
}

/// Decision policy.
pub fn decide(
    local: Option<ComponentVersion>,
    live: Option<ComponentVersion>,
    remote: ComponentVersion,
) -> Decision {
    let Some(effective) = local.or(live) else {
        return Decision::UpdateDue;
    };
    if remote > effective {
        return Decision::UpdateDue;
    }
    match live {
        Some(live) if live < effective => Decision::PendingRestart {
            live,
            file: effective,
        },
        _ => Decision::UpToDate(effective),
    }
}
