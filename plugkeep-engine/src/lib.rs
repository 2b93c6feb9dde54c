//! # plugkeep-engine
//!
//! Update reconciliation and safe replacement of installed components.
//!
//! Call [`Reconciler::run_pass`] with a freshly loaded config to check every
//! configured component against its latest release and replace the ones that
//! are behind.

pub mod error;
pub mod host;
pub mod notify;
pub mod probe;
pub mod reconcile;
pub mod release;
pub mod replace;
pub mod resolve;
pub mod sidecar;

pub use error::EngineError;
pub use host::{HostRuntime, ManifestHost, NoHost};
pub use notify::{Notifier, UpdateNotice, WebhookNotifier};
pub use probe::{MetadataProbe, VersionResourceProbe};
pub use reconcile::{
    ComponentOutcome, ComponentReport, PassSummary, Reconciler, ReplyBuffer, ReplySink, SkipReason,
};
pub use release::ReleaseClient;
pub use replace::{apply_update, ApplyKind, ApplyReport};
pub use resolve::{LocalVersion, VersionSource};
pub use sidecar::SidecarStatus;
