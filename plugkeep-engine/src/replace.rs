//! Safe replacement of an installed component.
//!
//! ## `apply_update` protocol
//!
//! 1. Download the asset to a random temp file inside the install directory.
//! 2. Archive: extract to a random temp directory, find the expected binary,
//!    merge its directory onto the install directory. Existing files under a
//!    `configs/` directory are never overwritten. Every file is staged as
//!    `<dest>.plugkeep.tmp` before any rename, and the binary is renamed last.
//! 3. Binary: drop the old `.bak`, rename the current binary to `.bak`, rename
//!    the download into place with the old binary's permissions. A failed
//!    final rename restores the `.bak`.
//! 4. Write the `<version>|<sha256>` sidecar. Failure here is only a warning.
//!
//! Until step 2 touches the install directory, any failure leaves it exactly
//! as it was: the temp file and directory are removed when dropped.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempDir};
use tokio_util::sync::CancellationToken;

use plugkeep_core::{ComponentLayout, ComponentVersion};

use crate::error::{io_err, EngineError};
use crate::release::{AssetKind, ReleaseClient};
use crate::sidecar::{self, VersionRecord};

/// Directory name whose existing contents survive an archive merge.
pub const PRESERVED_DIR: &str = "configs";

const DOWNLOAD_PREFIX: &str = ".plugkeep_dl_";
const EXTRACT_PREFIX: &str = "plugkeep_tmp_";
const COPY_TMP_SUFFIX: &str = ".plugkeep.tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyKind {
    Archive,
    Binary,
}

/// What a successful replacement did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub kind: ApplyKind,
    /// Files copied or renamed into the install directory.
    pub files_written: usize,
    /// Files left alone because they live under `configs/` and already existed.
    pub files_preserved: usize,
    /// `None` when the sidecar could not be written.
    #[serde(skip)]
    pub sidecar: Option<VersionRecord>,
    /// Best-effort cleanup steps that failed.
    pub cleanup_warnings: Vec<String>,
}

/// Download `asset_url` and install it as `version` of the component.
pub async fn apply_update(
    layout: &ComponentLayout,
    client: &ReleaseClient,
    asset_url: &str,
    version: ComponentVersion,
    cancel: &CancellationToken,
) -> Result<ApplyReport, EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let download = tempfile::Builder::new()
        .prefix(DOWNLOAD_PREFIX)
        .tempfile_in(layout.install_dir())
        .map_err(|e| io_err(layout.install_dir(), e))?;

    let bytes = client.download(asset_url, download.path()).await?;
    tracing::info!(
        component = %layout.name(),
        url = asset_url,
        bytes,
        "downloaded update asset",
    );

    let kind = AssetKind::of_url(asset_url);
    let owned_layout = layout.clone();
    let mut report = tokio::task::spawn_blocking(move || match kind {
        AssetKind::Archive => install_archive(&owned_layout, download),
        AssetKind::Binary => swap_binary(&owned_layout, download),
    })
    .await??;

    match sidecar::write_for(layout, version) {
        Ok(record) => report.sidecar = Some(record),
        Err(err) => tracing::warn!(
            component = %layout.name(),
            error = %err,
            "failed to write version sidecar; next pass will fall back to binary metadata",
        ),
    }

    for warning in &report.cleanup_warnings {
        tracing::warn!(component = %layout.name(), "{warning}");
    }
    tracing::info!(
        component = %layout.name(),
        version = %version,
        kind = ?report.kind,
        files = report.files_written,
        "update applied",
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Archive branch
// ---------------------------------------------------------------------------

/// Extract `download` and merge its content root onto the install directory.
pub(crate) fn install_archive(
    layout: &ComponentLayout,
    download: NamedTempFile,
) -> Result<ApplyReport, EngineError> {
    let install_dir = layout.install_dir();
    let extract_dir = tempfile::Builder::new()
        .prefix(EXTRACT_PREFIX)
        .tempdir_in(install_dir)
        .map_err(|e| io_err(install_dir, e))?;

    let archive_file = download.reopen().map_err(|e| io_err(download.path(), e))?;
    extract_zip(archive_file, extract_dir.path())?;

    let binary = layout.binary_file_name();
    let content_root =
        find_content_root(extract_dir.path(), &binary)?.ok_or(EngineError::BinaryNotInArchive {
            binary: binary.clone(),
        })?;
    tracing::debug!(
        component = %layout.name(),
        root = %content_root.display(),
        "archive content root located",
    );

    let mut plan = MergePlan::default();
    if let Err(err) = stage_tree(&content_root, &content_root, install_dir, &binary, &mut plan) {
        plan.discard();
        return Err(err);
    }
    let written = plan.commit()?;

    let mut cleanup_warnings = Vec::new();
    cleanup(extract_dir, download, &mut cleanup_warnings);

    Ok(ApplyReport {
        kind: ApplyKind::Archive,
        files_written: written,
        files_preserved: plan.preserved,
        sidecar: None,
        cleanup_warnings,
    })
}

fn extract_zip(archive_file: File, dest: &Path) -> Result<(), EngineError> {
    let mut archive = zip::ZipArchive::new(archive_file)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let out = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| io_err(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut file = File::create(&out).map_err(|e| io_err(&out, e))?;
        io::copy(&mut entry, &mut file).map_err(|e| io_err(&out, e))?;
    }
    Ok(())
}

/// Breadth-first search for the directory containing `binary`.
///
/// Directories are visited in sorted order, so the shallowest match wins and
/// ties are broken by name.
pub(crate) fn find_content_root(root: &Path, binary: &str) -> Result<Option<PathBuf>, EngineError> {
    let mut queue = VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let mut children = sorted_entries(&dir)?;
        if children
            .iter()
            .any(|(path, is_dir)| !is_dir && path.file_name().is_some_and(|n| n == binary))
        {
            return Ok(Some(dir));
        }
        children.retain(|(_, is_dir)| *is_dir);
        queue.extend(children.into_iter().map(|(path, _)| path));
    }
    Ok(None)
}

fn sorted_entries(dir: &Path) -> Result<Vec<(PathBuf, bool)>, EngineError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| io_err(entry.path(), e))?
            .is_dir();
        entries.push((entry.path(), is_dir));
    }
    entries.sort();
    Ok(entries)
}

/// A file copied next to its destination, waiting to be renamed over it.
#[derive(Debug)]
struct StagedFile {
    staged: PathBuf,
    dest: PathBuf,
}

/// Archive contents staged beside the install directory's files.
///
/// Nothing visible changes until [`MergePlan::commit`]. The expected binary is
/// renamed last, so a merge that stops early leaves the old binary and its
/// sidecar in agreement and the next pass retries the update.
#[derive(Debug, Default)]
struct MergePlan {
    files: Vec<StagedFile>,
    binary: Option<StagedFile>,
    preserved: usize,
}

impl MergePlan {
    fn commit(&mut self) -> Result<usize, EngineError> {
        let mut pending: Vec<StagedFile> = self.files.drain(..).collect();
        pending.extend(self.binary.take());

        let total = pending.len();
        let mut pending = pending.into_iter();
        while let Some(file) = pending.next() {
            if let Err(e) = fs::rename(&file.staged, &file.dest) {
                remove_staged(
                    std::iter::once(file.staged).chain(pending.by_ref().map(|f| f.staged)),
                );
                return Err(io_err(&file.dest, e));
            }
        }
        Ok(total)
    }

    fn discard(&mut self) {
        remove_staged(self.files.drain(..).map(|f| f.staged));
        remove_staged(self.binary.take().map(|f| f.staged));
    }
}

fn remove_staged(paths: impl IntoIterator<Item = PathBuf>) {
    for path in paths {
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staged file");
        }
    }
}

/// `true` when some directory above the file (relative to the install
/// directory) is literally named `configs`.
pub(crate) fn is_preserved(relative: &Path) -> bool {
    relative
        .parent()
        .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == PRESERVED_DIR))
}

fn stage_tree(
    source_root: &Path,
    dir: &Path,
    install_dir: &Path,
    binary: &str,
    plan: &mut MergePlan,
) -> Result<(), EngineError> {
    for (path, is_dir) in sorted_entries(dir)? {
        let relative = path
            .strip_prefix(source_root)
            .map_err(|_| io_err(&path, io::Error::other("path escaped archive root")))?;
        let dest = install_dir.join(relative);

        if is_dir {
            fs::create_dir_all(&dest).map_err(|e| io_err(&dest, e))?;
            stage_tree(source_root, &path, install_dir, binary, plan)?;
            continue;
        }

        if is_preserved(relative) && dest.exists() {
            tracing::debug!(path = %dest.display(), "keeping existing config file");
            plan.preserved += 1;
            continue;
        }

        let staged = stage_copy(&path, &dest)?;
        if relative == Path::new(binary) {
            plan.binary = Some(staged);
        } else {
            plan.files.push(staged);
        }
    }
    Ok(())
}

/// Copy `src` to `<dest>.plugkeep.tmp`.
fn stage_copy(src: &Path, dest: &Path) -> Result<StagedFile, EngineError> {
    if dest.is_dir() {
        return Err(io_err(
            dest,
            io::Error::other("a directory is in the way of an archive file"),
        ));
    }
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = dest.with_file_name(format!("{file_name}{COPY_TMP_SUFFIX}"));
    if let Err(e) = fs::copy(src, &staged) {
        if staged.is_file() {
            remove_staged([staged.clone()]);
        }
        return Err(io_err(&staged, e));
    }
    Ok(StagedFile {
        staged,
        dest: dest.to_path_buf(),
    })
}

fn cleanup(extract_dir: TempDir, download: NamedTempFile, warnings: &mut Vec<String>) {
    let extract_path = extract_dir.path().to_path_buf();
    if let Err(e) = extract_dir.close() {
        warnings.push(format!(
            "failed to remove extraction directory {}: {e}",
            extract_path.display()
        ));
    }
    let download_path = download.path().to_path_buf();
    if let Err(e) = download.close() {
        warnings.push(format!(
            "failed to remove downloaded archive {}: {e}",
            download_path.display()
        ));
    }
}

// ---------------------------------------------------------------------------
// Binary branch
// ---------------------------------------------------------------------------

/// Backup-and-swap of a single binary.
pub(crate) fn swap_binary(
    layout: &ComponentLayout,
    download: NamedTempFile,
) -> Result<ApplyReport, EngineError> {
    let binary = layout.binary_path();
    let backup = layout.backup_path();
    let mut cleanup_warnings = Vec::new();

    if backup.exists() {
        if let Err(e) = fs::remove_file(&backup) {
            cleanup_warnings.push(format!(
                "failed to remove previous backup {}: {e}",
                backup.display()
            ));
        }
    }

    let permissions = match fs::metadata(&binary) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => fresh_binary_permissions(),
    };
    if let Some(permissions) = permissions {
        download
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| io_err(download.path(), e))?;
    }

    let backed_up = binary.exists();
    if backed_up {
        fs::rename(&binary, &backup).map_err(|e| io_err(&binary, e))?;
    }

    if let Err(err) = download.persist(&binary) {
        if backed_up {
            if let Err(restore) = fs::rename(&backup, &binary) {
                tracing::error!(
                    backup = %backup.display(),
                    error = %restore,
                    "failed to restore backup after aborted swap",
                );
            }
        }
        return Err(io_err(&binary, err.error));
    }

    Ok(ApplyReport {
        kind: ApplyKind::Binary,
        files_written: 1,
        files_preserved: 0,
        sidecar: None,
        cleanup_warnings,
    })
}

/// Mode for a binary with no predecessor; temp files are created owner-only.
#[cfg(unix)]
fn fresh_binary_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn fresh_binary_permissions() -> Option<fs::Permissions> {
    None
}
