//! Host-runtime collaborator: which components the host currently has loaded.
//!
//! The host publishes its loaded set deliberately; the engine never reaches
//! into host internals. [`ManifestHost`] reads the versioned document a host
//! writes to `<state_dir>/loaded-components.json`:
//!
//! ```json
//! {"schema": 1, "components": [{"install_dir_name": "Foo", "reported_version": "1.0.0"}]}
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use plugkeep_core::LoadedComponent;

pub const MANIFEST_FILE: &str = "loaded-components.json";
pub const MANIFEST_SCHEMA: u32 = 1;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host manifest not available at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host manifest is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported host manifest schema {0}")]
    UnsupportedSchema(u32),
}

/// Enumerates the components the host has loaded in memory.
pub trait HostRuntime: Send + Sync {
    fn loaded_components(&self) -> Result<Vec<LoadedComponent>, HostError>;
}

/// Host that reports nothing loaded. Live versions are always unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl HostRuntime for NoHost {
    fn loaded_components(&self) -> Result<Vec<LoadedComponent>, HostError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: u32,
    #[serde(default)]
    components: Vec<LoadedComponent>,
}

/// Reads the host-published manifest on every call.
#[derive(Debug, Clone)]
pub struct ManifestHost {
    path: PathBuf,
}

impl ManifestHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<state_dir>/loaded-components.json`
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(MANIFEST_FILE))
    }
}

impl HostRuntime for ManifestHost {
    fn loaded_components(&self) -> Result<Vec<LoadedComponent>, HostError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| HostError::Unavailable {
                path: self.path.clone(),
                source,
            })?;
        let manifest: Manifest = serde_json::from_str(&contents)?;
        if manifest.schema != MANIFEST_SCHEMA {
            return Err(HostError::UnsupportedSchema(manifest.schema));
        }
        Ok(manifest.components)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// In-memory host for tests.
    #[derive(Debug, Default, Clone)]
    pub struct StaticHost(pub Vec<LoadedComponent>);

    impl StaticHost {
        pub fn with(name: &str, version: &str) -> Self {
            Self(vec![LoadedComponent {
                install_dir_name: name.to_string(),
                reported_version: version.to_string(),
            }])
        }
    }

    impl HostRuntime for StaticHost {
        fn loaded_components(&self) -> Result<Vec<LoadedComponent>, HostError> {
            Ok(self.0.clone())
        }
    }
}
