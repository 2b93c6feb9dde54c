//! Error types for plugkeep-engine.

use std::path::PathBuf;

use thiserror::Error;

use plugkeep_core::ConfigError;

/// All errors that can arise while resolving or replacing a component.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level HTTP failure (DNS, TLS, timeout, truncated body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered, but not with a 2xx.
    #[error("GET {url} returned {status}")]
    HttpStatus { url: String, status: u16 },

    /// The asset server sent nothing for longer than the client timeout.
    #[error("download of {url} stalled for {secs}s")]
    DownloadStalled { url: String, secs: f64 },

    /// Another process holds the plugins directory lock.
    #[error("failed to lock plugins directory at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The downloaded archive could not be read.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive does not contain the expected binary anywhere.
    #[error("{binary} not found in downloaded archive")]
    BinaryNotInArchive { binary: String },

    /// The plugins root directory does not exist; no pass is possible.
    #[error("plugins directory not found at {path}")]
    PluginsDirMissing { path: PathBuf },

    /// The pass was cancelled before this step started.
    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
