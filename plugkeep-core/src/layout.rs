//! Directory roots and per-component file paths.
//!
//! ```text
//! <plugins_dir>/
//!   <Component>/
//!     <Component>.dll        binary
//!     <Component>.dll.bak    previous binary (single-binary updates only)
//!     <Component>.version    sidecar record "<version>|<sha256>"
//!     configs/               user settings, never overwritten once present
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::ComponentName;

pub const BINARY_EXTENSION: &str = "dll";
pub const BACKUP_SUFFIX: &str = ".bak";
pub const SIDECAR_EXTENSION: &str = "version";

/// The three roots the engine works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root install directory; one sub-directory per component.
    pub plugins_dir: PathBuf,
    /// Directory holding `config.yaml`.
    pub config_dir: PathBuf,
    /// Daemon socket and host-published runtime files.
    pub state_dir: PathBuf,
}

impl Paths {
    /// Defaults rooted at `<home>/.plugkeep`.
    pub fn at_home(home: &Path) -> Self {
        let root = home.join(".plugkeep");
        Self {
            plugins_dir: root.join("plugins"),
            config_dir: root.join("config"),
            state_dir: root.join("state"),
        }
    }

    /// `at_home` convenience wrapper using `dirs::home_dir()`.
    pub fn from_home() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self::at_home(&home))
    }

    /// Start from the home defaults and replace whichever roots are given.
    pub fn resolve(
        plugins_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
        state_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let (Some(plugins_dir), Some(config_dir), Some(state_dir)) =
            (plugins_dir.clone(), config_dir.clone(), state_dir.clone())
        {
            return Ok(Self {
                plugins_dir,
                config_dir,
                state_dir,
            });
        }
        let defaults = Self::from_home()?;
        Ok(Self {
            plugins_dir: plugins_dir.unwrap_or(defaults.plugins_dir),
            config_dir: config_dir.unwrap_or(defaults.config_dir),
            state_dir: state_dir.unwrap_or(defaults.state_dir),
        })
    }

    pub fn component(&self, name: &ComponentName) -> ComponentLayout {
        ComponentLayout::new(&self.plugins_dir, name)
    }
}

/// File paths for one managed component. Pure, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLayout {
    name: ComponentName,
    install_dir: PathBuf,
}

impl ComponentLayout {
    pub fn new(plugins_dir: &Path, name: &ComponentName) -> Self {
        Self {
            name: name.clone(),
            install_dir: plugins_dir.join(&name.0),
        }
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// `<Component>.dll`
    pub fn binary_file_name(&self) -> String {
        format!("{}.{BINARY_EXTENSION}", self.name.0)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(self.binary_file_name())
    }

    pub fn backup_path(&self) -> PathBuf {
        self.install_dir
            .join(format!("{}{BACKUP_SUFFIX}", self.binary_file_name()))
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.install_dir
            .join(format!("{}.{SIDECAR_EXTENSION}", self.name.0))
    }
}
