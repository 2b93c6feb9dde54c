//! `plugkeep check` — one manual update pass.
//!
//! When a daemon is listening, the pass runs there so it cannot overlap a
//! scheduled one. Otherwise it runs in this process.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;

use plugkeep_core::{config, Paths};
use plugkeep_daemon::paths::CONSOLE_CALLER;
use plugkeep_daemon::{is_running, request_check};
use plugkeep_engine::{ComponentOutcome, PassSummary, Reconciler, ReplySink};

/// Arguments for `plugkeep check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Treat a non-interactive stdin as the console (scripts, CI).
    #[arg(long)]
    pub force_console: bool,

    /// Emit the pass summary as JSON instead of progress lines and a table.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self, paths: &Paths) -> Result<()> {
        if !self.force_console && !std::io::stdin().is_terminal() {
            bail!("check can only be run from the console (pass --force-console to override)");
        }

        let summary = if is_running(&paths.state_dir) {
            let reply = request_check(&paths.state_dir, CONSOLE_CALLER)
                .context("daemon failed to run the check")?;
            if !self.json {
                for line in &reply.replies {
                    println!("{line}");
                }
            }
            reply.summary
        } else {
            self.run_in_process(paths)?
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }

    fn run_in_process(&self, paths: &Paths) -> Result<PassSummary> {
        let config = config::load_at(&paths.config_dir)
            .with_context(|| format!("failed to load config from {}", paths.config_dir.display()))?;
        let reconciler = Reconciler::for_state_dir(&paths.state_dir);
        let print_line = |line: &str| println!("{line}");
        let reply: Option<&dyn ReplySink> = if self.json {
            None
        } else {
            Some(&print_line as &dyn ReplySink)
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        runtime.block_on(async {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            reconciler
                .run_pass(&config, &paths.plugins_dir, reply, &cancel)
                .await
                .context("update pass failed")
        })
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "plugin")]
    plugin: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_summary(summary: &PassSummary) {
    if summary.components.is_empty() {
        println!("No plugins configured for auto-update.");
        return;
    }

    let rows: Vec<OutcomeRow> = summary
        .components
        .iter()
        .map(|c| OutcomeRow {
            plugin: c.component.to_string(),
            result: outcome_label(&c.outcome),
            detail: outcome_detail(&c.outcome),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let mut totals = format!(
        "{} updated | {} skipped | {} failed | {} ms",
        summary.updated(),
        summary.skipped(),
        summary.failed(),
        summary.duration_ms,
    );
    if summary.cancelled {
        totals.push_str(" | cancelled");
    }
    println!("{totals}");
}

fn outcome_label(outcome: &ComponentOutcome) -> String {
    match outcome {
        ComponentOutcome::UpToDate { .. } => "UP TO DATE".green().to_string(),
        ComponentOutcome::PendingRestart { .. } => "RESTART".cyan().to_string(),
        ComponentOutcome::Updated { .. } => "UPDATED".green().bold().to_string(),
        ComponentOutcome::Skipped { .. } => "SKIPPED".yellow().to_string(),
        ComponentOutcome::Failed { .. } => "FAILED".red().bold().to_string(),
    }
}

fn outcome_detail(outcome: &ComponentOutcome) -> String {
    match outcome {
        ComponentOutcome::UpToDate { version } => version.to_string(),
        ComponentOutcome::PendingRestart { live, file } => {
            format!("loaded {live}, on disk {file}; restart to apply")
        }
        ComponentOutcome::Updated { from, to, .. } => {
            let from = from.map_or_else(|| "unknown".to_string(), |v| v.to_string());
            format!("{from} → {to}")
        }
        ComponentOutcome::Skipped { reason } => reason.to_string(),
        ComponentOutcome::Failed { error } => error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugkeep_engine::SkipReason;

    #[test]
    fn detail_shows_unknown_when_from_is_missing() {
        let outcome = ComponentOutcome::Updated {
            from: None,
            to: "1.2.0".parse().unwrap(),
            report: serde_json::from_value(serde_json::json!({
                "kind": "binary",
                "files_written": 1,
                "files_preserved": 0,
                "cleanup_warnings": []
            }))
            .unwrap(),
        };
        assert_eq!(outcome_detail(&outcome), "unknown → 1.2.0");
    }

    #[test]
    fn skipped_detail_uses_reason_text() {
        let outcome = ComponentOutcome::Skipped {
            reason: SkipReason::NoRelease,
        };
        assert_eq!(outcome_detail(&outcome), "no release available");
    }
}
