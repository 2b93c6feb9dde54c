//! Error types for plugkeep-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `config.yaml` exists but is not valid YAML for this schema.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No home directory, so the default roots cannot be derived.
    #[error("cannot determine home directory; set $HOME or pass explicit directories")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Why a repository reference string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoRefError {
    #[error("repository reference is empty")]
    Empty,

    #[error("malformed repository URL '{0}'")]
    InvalidUrl(String),

    #[error("repository URL '{0}' has fewer than two path segments")]
    UrlTooShort(String),

    #[error("expected 'owner/repo', got {segments} segment(s) in '{input}'")]
    SegmentCount { input: String, segments: usize },
}

/// Why a version string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version '{0}' must have between 2 and 4 numeric fields")]
    FieldCount(String),

    #[error("version '{input}' has a non-numeric field '{field}'")]
    NotNumeric { input: String, field: String },
}
