//! plugkeep core library — domain types, parsing, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`version`] — [`ComponentVersion`], the 4-field numeric version
//! - [`repo_ref`] — repository reference parsing
//! - [`config`] — [`AutoUpdateConfig`] load / save / defaults
//! - [`layout`] — on-disk paths for a managed component
//! - [`error`] — [`ConfigError`], [`RepoRefError`], [`VersionParseError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod repo_ref;
pub mod types;
pub mod version;

pub use config::{AutoUpdateConfig, Schedule};
pub use error::{ConfigError, RepoRefError, VersionParseError};
pub use layout::{ComponentLayout, Paths};
pub use types::{ComponentName, LoadedComponent, ReleaseDescriptor, RepoRef};
pub use version::ComponentVersion;
