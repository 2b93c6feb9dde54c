//! `plugkeep status` — what is installed, what is trusted, what is loaded.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use plugkeep_core::{config, repo_ref, AutoUpdateConfig, ComponentName, Paths, Schedule};
use plugkeep_engine::resolve::{resolve_live, resolve_local};
use plugkeep_engine::{ManifestHost, SidecarStatus, VersionResourceProbe, VersionSource};

/// Arguments for `plugkeep status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, paths: &Paths) -> Result<()> {
        let config = config::load_at(&paths.config_dir)
            .with_context(|| format!("failed to load config from {}", paths.config_dir.display()))?;

        let report = build_report(paths, &config);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    plugins_dir: String,
    schedule: String,
    components: Vec<ComponentStatus>,
}

#[derive(Debug, Serialize)]
struct ComponentStatus {
    component: String,
    repository: String,
    /// Normalized `owner/repo`, `None` when the configured value is invalid.
    repo: Option<String>,
    installed: bool,
    local_version: Option<String>,
    source: VersionSource,
    sidecar: &'static str,
    live_version: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "plugin")]
    component: String,
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "on disk")]
    local: String,
    #[tabled(rename = "sidecar")]
    sidecar: String,
    #[tabled(rename = "loaded")]
    live: String,
}

fn build_report(paths: &Paths, config: &AutoUpdateConfig) -> StatusReport {
    let host = ManifestHost::in_state_dir(&paths.state_dir);

    let components = config
        .repositories
        .iter()
        .map(|(name, repository)| {
            let name = ComponentName::from(name.as_str());
            if !name.is_single_component() {
                return ComponentStatus {
                    component: name.to_string(),
                    repository: repository.clone(),
                    repo: repo_ref::parse(repository).ok().map(|r| r.to_string()),
                    installed: false,
                    local_version: None,
                    source: VersionSource::Unknown,
                    sidecar: "invalid_name",
                    live_version: None,
                };
            }
            let layout = paths.component(&name);
            let installed = layout.binary_path().is_file();
            let local = resolve_local(&layout, &VersionResourceProbe);

            ComponentStatus {
                component: name.to_string(),
                repository: repository.clone(),
                repo: repo_ref::parse(repository).ok().map(|r| r.to_string()),
                installed,
                local_version: local.version.map(|v| v.to_string()),
                source: local.source,
                sidecar: sidecar_key(&local.sidecar),
                live_version: resolve_live(&host, &name).map(|v| v.to_string()),
            }
        })
        .collect();

    StatusReport {
        plugins_dir: paths.plugins_dir.display().to_string(),
        schedule: describe_schedule(config.schedule()),
        components,
    }
}

fn describe_schedule(schedule: Schedule) -> String {
    match schedule {
        Schedule::Interval(every) => format!("every {} min", every.as_secs() / 60),
        Schedule::DailyAt(time) => format!("daily at {} UTC", time.format("%H:%M:%S")),
    }
}

fn sidecar_key(status: &SidecarStatus) -> &'static str {
    match status {
        SidecarStatus::Trusted(_) => "trusted",
        SidecarStatus::Absent => "absent",
        SidecarStatus::Legacy => "legacy",
        SidecarStatus::HashMismatch => "hash_mismatch",
        SidecarStatus::Unparsable => "unparsable",
        SidecarStatus::Unreadable(_) => "unreadable",
    }
}

fn print_table(report: StatusReport) {
    println!(
        "plugkeep v{} | {} plugins | {}",
        env!("CARGO_PKG_VERSION"),
        report.components.len(),
        report.schedule,
    );
    println!("Plugins directory: {}", report.plugins_dir);

    if report.components.is_empty() {
        println!("No plugins configured for auto-update.");
        return;
    }

    let rows: Vec<StatusTableRow> = report
        .components
        .into_iter()
        .map(|c| {
            let local = match (c.installed, c.local_version) {
                (false, _) => "not installed".bright_black().to_string(),
                (true, Some(v)) => v,
                (true, None) => "unknown".yellow().to_string(),
            };
            let repository = match c.repo {
                Some(repo) => repo,
                None => format!("{} (invalid)", c.repository).red().to_string(),
            };
            let sidecar = match c.sidecar {
                "trusted" => c.sidecar.green().to_string(),
                "absent" => c.sidecar.to_string(),
                other => other.yellow().to_string(),
            };
            StatusTableRow {
                component: c.component,
                repository,
                local,
                sidecar,
                live: c.live_version.unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
