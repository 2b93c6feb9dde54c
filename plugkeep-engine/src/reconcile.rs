//! Reconciliation pass: every configured component, one at a time.
//!
//! A pass never fails because of one component. Per-component problems end up
//! as [`ComponentOutcome::Skipped`] or [`ComponentOutcome::Failed`] and the
//! pass moves on. Only a missing plugins directory (or an unusable HTTP
//! client) aborts the whole pass.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use plugkeep_core::{repo_ref, AutoUpdateConfig, ComponentLayout, ComponentName, ComponentVersion, RepoRef};

use crate::error::{io_err, EngineError};
use crate::host::{HostRuntime, ManifestHost};
use crate::notify::{Notifier, UpdateNotice, WebhookNotifier};
use crate::probe::{MetadataProbe, VersionResourceProbe};
use crate::release::ReleaseClient;
use crate::replace::{self, ApplyReport};
use crate::resolve::{self, Decision};

pub const REPLY_STARTED: &str = "Checking for plugin updates...";
pub const REPLY_FINISHED: &str = "Manual check finished.";

/// Lock file in the plugins directory, held exclusively for a whole pass.
pub const PASS_LOCK_FILE: &str = ".plugkeep.lock";

/// Receives human-readable progress lines during a manual pass.
pub trait ReplySink: Send + Sync {
    fn reply(&self, line: &str);
}

impl<F> ReplySink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn reply(&self, line: &str) {
        self(line)
    }
}

/// Collects reply lines so they can be shipped elsewhere after the pass.
#[derive(Debug, Default)]
pub struct ReplyBuffer(StdMutex<Vec<String>>);

impl ReplyBuffer {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ReplySink for ReplyBuffer {
    fn reply(&self, line: &str) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(line.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a component was left alone this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidComponentName,
    EmptyRepository,
    InvalidRepository { input: String, error: String },
    NotInstalled,
    BinaryMissing,
    NoRelease,
    UnparsableTag,
    NoAsset { version: ComponentVersion },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidComponentName => {
                f.write_str("name is not a single directory under the plugins directory")
            }
            SkipReason::EmptyRepository => f.write_str("no repository configured"),
            SkipReason::InvalidRepository { input, error } => {
                write!(f, "invalid repository {input:?}: {error}")
            }
            SkipReason::NotInstalled => f.write_str("install directory not found"),
            SkipReason::BinaryMissing => f.write_str("binary not found"),
            SkipReason::NoRelease => f.write_str("no release available"),
            SkipReason::UnparsableTag => f.write_str("release tag is not a version"),
            SkipReason::NoAsset { version } => {
                write!(f, "release {version} has no compatible asset")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComponentOutcome {
    UpToDate {
        version: ComponentVersion,
    },
    PendingRestart {
        live: ComponentVersion,
        file: ComponentVersion,
    },
    Updated {
        from: Option<ComponentVersion>,
        to: ComponentVersion,
        report: ApplyReport,
    },
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub component: ComponentName,
    pub outcome: ComponentOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub components: Vec<ComponentReport>,
    /// Cancellation stopped the pass before every component was visited.
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl PassSummary {
    fn count(&self, pred: impl Fn(&ComponentOutcome) -> bool) -> usize {
        self.components.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Failed { .. }))
    }

    pub fn outcome_of(&self, component: &str) -> Option<&ComponentOutcome> {
        self.components
            .iter()
            .find(|c| c.component.0 == component)
            .map(|c| &c.outcome)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Runs reconciliation passes, one at a time.
pub struct Reconciler {
    host: Arc<dyn HostRuntime>,
    probe: Arc<dyn MetadataProbe>,
    notifier: Option<Arc<dyn Notifier>>,
    pass_guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(host: Arc<dyn HostRuntime>, probe: Arc<dyn MetadataProbe>) -> Self {
        Self {
            host,
            probe,
            notifier: None,
            pass_guard: Mutex::new(()),
        }
    }

    /// Host manifest under `state_dir`, version-resource probe.
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self::new(
            Arc::new(ManifestHost::in_state_dir(state_dir)),
            Arc::new(VersionResourceProbe),
        )
    }

    /// Use `notifier` instead of the webhook from the config.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run one full pass over `config.repositories`.
    ///
    /// Waits for any pass already running, in this process or in another one
    /// sharing the plugins directory.
    pub async fn run_pass(
        &self,
        config: &AutoUpdateConfig,
        plugins_dir: &Path,
        reply: Option<&dyn ReplySink>,
        cancel: &CancellationToken,
    ) -> Result<PassSummary, EngineError> {
        let _guard = self.pass_guard.lock().await;
        let started = Instant::now();
        let started_at = Utc::now();
        send(reply, REPLY_STARTED);

        if !plugins_dir.is_dir() {
            tracing::warn!(path = %plugins_dir.display(), "plugins directory not found; skipping pass");
            return Err(EngineError::PluginsDirMissing {
                path: plugins_dir.to_path_buf(),
            });
        }
        let _dir_lock = lock_plugins_dir(plugins_dir).await?;

        let client = ReleaseClient::from_config(config)?;
        let notifier = self.notifier_for(config);

        let mut components = Vec::new();
        let mut cancelled = false;
        for (name, repository) in &config.repositories {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let name = ComponentName::from(name.as_str());
            let ctx = PassContext {
                client: &client,
                notifier: notifier.as_deref(),
                reply,
                cancel,
            };
            match self.reconcile_one(&ctx, plugins_dir, &name, repository).await {
                Ok(outcome) => components.push(ComponentReport {
                    component: name,
                    outcome,
                }),
                Err(EngineError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    tracing::error!(component = %name, error = %err, "unexpected error; continuing");
                    components.push(ComponentReport {
                        component: name,
                        outcome: ComponentOutcome::Failed {
                            error: err.to_string(),
                        },
                    });
                }
            }
        }

        if cancelled {
            tracing::info!("pass cancelled");
        }
        send(reply, REPLY_FINISHED);

        let summary = PassSummary {
            started_at,
            components,
            cancelled,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            checked = summary.components.len(),
            updated = summary.updated(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            duration_ms = summary.duration_ms,
            "pass complete",
        );
        Ok(summary)
    }

    fn notifier_for(&self, config: &AutoUpdateConfig) -> Option<Arc<dyn Notifier>> {
        if let Some(notifier) = &self.notifier {
            return Some(Arc::clone(notifier));
        }
        let url = config.webhook_url()?;
        match WebhookNotifier::new(url, config.http_timeout()) {
            Ok(notifier) => Some(Arc::new(notifier)),
            Err(err) => {
                tracing::warn!(error = %err, "cannot build webhook notifier; notifications disabled");
                None
            }
        }
    }

    async fn reconcile_one(
        &self,
        ctx: &PassContext<'_>,
        plugins_dir: &Path,
        name: &ComponentName,
        repository: &str,
    ) -> Result<ComponentOutcome, EngineError> {
        if !name.is_single_component() {
            tracing::warn!(component = %name, "component name is not a plain directory name");
            return Ok(skipped(SkipReason::InvalidComponentName));
        }
        if repository.trim().is_empty() {
            tracing::warn!(component = %name, "no repository configured");
            return Ok(skipped(SkipReason::EmptyRepository));
        }
        let repo = match repo_ref::parse(repository) {
            Ok(repo) => repo,
            Err(err) => {
                tracing::warn!(component = %name, input = repository, error = %err, "invalid repository");
                return Ok(skipped(SkipReason::InvalidRepository {
                    input: repository.to_string(),
                    error: err.to_string(),
                }));
            }
        };

        let layout = ComponentLayout::new(plugins_dir, name);
        if !layout.install_dir().is_dir() {
            tracing::warn!(component = %name, path = %layout.install_dir().display(), "install directory not found");
            return Ok(skipped(SkipReason::NotInstalled));
        }
        if !layout.binary_path().is_file() {
            tracing::warn!(component = %name, path = %layout.binary_path().display(), "binary not found");
            return Ok(skipped(SkipReason::BinaryMissing));
        }

        let local = {
            let layout = layout.clone();
            let probe = Arc::clone(&self.probe);
            tokio::task::spawn_blocking(move || resolve::resolve_local(&layout, probe.as_ref())).await?
        };
        let live = resolve::resolve_live(self.host.as_ref(), name);
        tracing::debug!(
            component = %name,
            local = ?local.version,
            source = ?local.source,
            live = ?live,
            "resolved versions",
        );

        let Some(release) = ctx.client.latest_release(&repo).await else {
            return Ok(skipped(SkipReason::NoRelease));
        };
        let Some(remote) = release.version else {
            tracing::warn!(component = %name, repo = %repo, "latest release tag is not a version");
            return Ok(skipped(SkipReason::UnparsableTag));
        };

        match resolve::decide(local.version, live, remote) {
            Decision::UpToDate(version) => {
                tracing::info!(component = %name, version = %version, "up to date");
                Ok(ComponentOutcome::UpToDate { version })
            }
            Decision::PendingRestart { live, file } => {
                tracing::info!(
                    component = %name,
                    live = %live,
                    file = %file,
                    "update applied, pending restart",
                );
                Ok(ComponentOutcome::PendingRestart { live, file })
            }
            Decision::UpdateDue => {
                let Some(asset_url) = release.asset_url else {
                    tracing::warn!(component = %name, version = %remote, "no compatible asset in release");
                    return Ok(skipped(SkipReason::NoAsset { version: remote }));
                };
                let from = local.version.or(live);
                self.apply(ctx, &layout, &repo, &asset_url, from, remote).await
            }
        }
    }

    async fn apply(
        &self,
        ctx: &PassContext<'_>,
        layout: &ComponentLayout,
        repo: &RepoRef,
        asset_url: &str,
        from: Option<ComponentVersion>,
        to: ComponentVersion,
    ) -> Result<ComponentOutcome, EngineError> {
        let name = layout.name();
        match replace::apply_update(layout, ctx.client, asset_url, to, ctx.cancel).await {
            Ok(report) => {
                send(
                    ctx.reply,
                    &format!("Updated {} to {to}.", layout.binary_file_name()),
                );
                notify(
                    ctx.notifier,
                    UpdateNotice::Success {
                        component: name.clone(),
                        repo: repo.clone(),
                        from,
                        to,
                    },
                )
                .await;
                Ok(ComponentOutcome::Updated { from, to, report })
            }
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                tracing::error!(component = %name, error = %err, "update failed");
                notify(
                    ctx.notifier,
                    UpdateNotice::Failure {
                        component: name.clone(),
                        repo: repo.clone(),
                        error: err.to_string(),
                    },
                )
                .await;
                Ok(ComponentOutcome::Failed {
                    error: err.to_string(),
                })
            }
        }
    }
}

struct PassContext<'a> {
    client: &'a ReleaseClient,
    notifier: Option<&'a dyn Notifier>,
    reply: Option<&'a dyn ReplySink>,
    cancel: &'a CancellationToken,
}

/// Open `<plugins_dir>/.plugkeep.lock` and block until it is held exclusively.
/// Dropping the file releases the lock.
async fn lock_plugins_dir(plugins_dir: &Path) -> Result<File, EngineError> {
    let path = plugins_dir.join(PASS_LOCK_FILE);
    tokio::task::spawn_blocking(move || {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        tracing::debug!(path = %path.display(), "acquiring plugins directory lock");
        file.lock_exclusive()
            .map_err(|source| EngineError::Lock { path, source })?;
        Ok(file)
    })
    .await?
}

fn skipped(reason: SkipReason) -> ComponentOutcome {
    ComponentOutcome::Skipped { reason }
}

fn send(reply: Option<&dyn ReplySink>, line: &str) {
    if let Some(reply) = reply {
        reply.reply(line);
    }
}

async fn notify(notifier: Option<&dyn Notifier>, notice: UpdateNotice) {
    let Some(notifier) = notifier else { return };
    if let Err(err) = notifier.notify(&notice).await {
        tracing::warn!(component = %notice.component(), error = %err, "failed to send notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures::StaticHost;
    use crate::host::NoHost;
    use crate::notify::fixtures::RecordingNotifier;
    use crate::probe::fixtures::resource_entry;
    use crate::probe::{VersionResourceProbe, EMBEDDED_VERSION_KEY};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, repos: &[(&str, &str)]) -> AutoUpdateConfig {
        AutoUpdateConfig {
            api_base_url: Some(server.uri()),
            repositories: repos
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            ..AutoUpdateConfig::default()
        }
    }

    fn install(plugins: &Path, name: &str, version: &str) -> ComponentLayout {
        let layout = ComponentLayout::new(plugins, &ComponentName::from(name));
        std::fs::create_dir_all(layout.install_dir()).unwrap();
        std::fs::write(layout.binary_path(), resource_entry(EMBEDDED_VERSION_KEY, version)).unwrap();
        layout
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(NoHost), Arc::new(VersionResourceProbe))
    }

    async fn mount_release(server: &MockServer, repo: &str, tag: &str, asset: Option<&str>) {
        let assets = match asset {
            Some(name) => json!([{"name": name, "browser_download_url": format!("{}/dl/{name}", server.uri())}]),
            None => json!([]),
        };
        Mock::given(method("GET"))
            .and(path(format!("/repos/{repo}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag_name": tag, "assets": assets})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn missing_plugins_dir_aborts_pass() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let err = reconciler()
            .run_pass(
                &config(&server, &[("Foo", "acme/foo")]),
                &tmp.path().join("nope"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PluginsDirMissing { .. }));
    }

    #[tokio::test]
    async fn skip_conditions_do_not_stop_the_pass() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("NoBinary")).unwrap();
        install(tmp.path(), "Current", "2.0.0");
        mount_release(&server, "acme/current", "v2.0.0", Some("Current.dll")).await;

        let cfg = config(
            &server,
            &[
                ("Blank", "  "),
                ("BadRef", "just-owner"),
                ("Ghost", "acme/ghost"),
                ("NoBinary", "acme/nobinary"),
                ("Current", "acme/current"),
            ],
        );
        let summary = reconciler()
            .run_pass(&cfg, tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.components.len(), 5);
        assert_eq!(summary.skipped(), 4);
        assert!(matches!(
            summary.outcome_of("Blank"),
            Some(ComponentOutcome::Skipped { reason: SkipReason::EmptyRepository })
        ));
        assert!(matches!(
            summary.outcome_of("BadRef"),
            Some(ComponentOutcome::Skipped { reason: SkipReason::InvalidRepository { .. } })
        ));
        assert!(matches!(
            summary.outcome_of("Ghost"),
            Some(ComponentOutcome::Skipped { reason: SkipReason::NotInstalled })
        ));
        assert!(matches!(
            summary.outcome_of("NoBinary"),
            Some(ComponentOutcome::Skipped { reason: SkipReason::BinaryMissing })
        ));
        assert_eq!(
            summary.outcome_of("Current"),
            Some(&ComponentOutcome::UpToDate {
                version: "2.0.0".parse().unwrap()
            })
        );
    }

    #[tokio::test]
    async fn names_that_leave_the_plugins_dir_are_skipped() {
        let server = MockServer::start().await;
        let root = TempDir::new().unwrap();
        let plugins = root.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        // A component living next to the plugins directory must not be reachable.
        install(root.path(), "other", "1.0.0");
        mount_release(&server, "acme/other", "v9.0.0", Some("other.dll")).await;

        let cfg = config(&server, &[("../other", "acme/other"), ("a/b", "acme/other")]);
        let summary = reconciler()
            .run_pass(&cfg, &plugins, None, &CancellationToken::new())
            .await
            .unwrap();

        for name in ["../other", "a/b"] {
            assert_eq!(
                summary.outcome_of(name),
                Some(&ComponentOutcome::Skipped {
                    reason: SkipReason::InvalidComponentName
                })
            );
        }
        assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
    }

    #[tokio::test]
    async fn pass_waits_for_plugins_dir_lock_held_elsewhere() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join(PASS_LOCK_FILE);
        let holder = File::create(&lock_path).unwrap();
        holder.lock_exclusive().unwrap();

        let plugins = tmp.path().to_path_buf();
        let cfg = config(&server, &[]);
        let mut pass = tokio::spawn(async move {
            reconciler()
                .run_pass(&cfg, &plugins, None, &CancellationToken::new())
                .await
        });

        let early = tokio::time::timeout(std::time::Duration::from_millis(300), &mut pass).await;
        assert!(early.is_err(), "pass ran while another holder had the lock");

        drop(holder);
        let summary = tokio::time::timeout(std::time::Duration::from_secs(5), pass)
            .await
            .expect("pass finishes once the lock is released")
            .unwrap()
            .unwrap();
        assert!(summary.components.is_empty());
    }

    #[tokio::test]
    async fn components_are_processed_in_name_order() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let cfg = config(&server, &[("Zed", "a/z"), ("Alpha", "a/a"), ("Mid", "a/m")]);
        let summary = reconciler()
            .run_pass(&cfg, tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap();
        let order: Vec<_> = summary.components.iter().map(|c| c.component.0.as_str()).collect();
        assert_eq!(order, ["Alpha", "Mid", "Zed"]);
    }

    #[tokio::test]
    async fn pending_restart_when_host_runs_older_instance() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        install(tmp.path(), "Foo", "1.1.0");
        mount_release(&server, "acme/foo", "1.1.0", Some("Foo.dll")).await;

        let host = StaticHost::with("Foo", "1.0.0");
        let summary = Reconciler::new(Arc::new(host), Arc::new(VersionResourceProbe))
            .run_pass(&config(&server, &[("Foo", "acme/foo")]), tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            summary.outcome_of("Foo"),
            Some(ComponentOutcome::PendingRestart { .. })
        ));
    }

    #[tokio::test]
    async fn update_replies_and_notifies() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        install(tmp.path(), "Foo", "1.0.0");
        mount_release(&server, "acme/foo", "v1.1.0", Some("Foo.dll")).await;
        Mock::given(method("GET"))
            .and(path("/dl/Foo.dll"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new build".to_vec()))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let replies = ReplyBuffer::default();
        let summary = reconciler()
            .with_notifier(notifier.clone())
            .run_pass(
                &config(&server, &[("Foo", "acme/foo")]),
                tmp.path(),
                Some(&replies),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.updated(), 1);
        assert_eq!(
            replies.lines(),
            vec![REPLY_STARTED, "Updated Foo.dll to 1.1.0.", REPLY_FINISHED]
        );
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(&notices[0], UpdateNotice::Success { from: Some(_), .. }));
    }

    #[tokio::test]
    async fn failed_download_is_reported_and_notified() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let layout = install(tmp.path(), "Foo", "1.0.0");
        mount_release(&server, "acme/foo", "1.1.0", Some("Foo.dll")).await;
        Mock::given(method("GET"))
            .and(path("/dl/Foo.dll"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let summary = reconciler()
            .with_notifier(notifier.clone())
            .run_pass(&config(&server, &[("Foo", "acme/foo")]), tmp.path(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed(), 1);
        assert!(matches!(&notifier.notices()[0], UpdateNotice::Failure { .. }));
        let names: Vec<_> = std::fs::read_dir(layout.install_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Foo.dll".to_string()], "download temp file must not survive");
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_component() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = reconciler()
            .run_pass(&config(&server, &[("Foo", "acme/foo")]), tmp.path(), None, &cancel)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.components.is_empty());
    }

    #[test]
    fn outcome_json_is_tagged() {
        let outcome = ComponentOutcome::Skipped {
            reason: SkipReason::NoAsset {
                version: "1.1.0".parse().unwrap(),
            },
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({"outcome": "skipped", "reason": "no_asset", "version": "1.1.0"}));
        let back: ComponentOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }
}
