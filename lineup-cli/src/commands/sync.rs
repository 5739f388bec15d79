//! `lineup sync` — reconcile every catalog record against the remote store.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use lineup_remote::Remote;
use lineup_sync::{
    GroupReport, Reconciler, RecordOutcome, RunReport, Sequencer, SyncSummary, SystemClock,
    ThreadPacer,
};

use super::{load_settings, CatalogArgs, RemoteArgs};

/// Arguments for `lineup sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Only sync groups with this name (case-sensitive).
    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Pause after every record, in milliseconds.
    #[arg(long, value_name = "N")]
    pub delay_ms: Option<u64>,

    /// Print the full report as JSON instead of summary lines.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl SyncArgs {
    /// Returns the process exit code of the run.
    pub fn run(self) -> Result<i32> {
        let mut settings = load_settings()?;
        self.remote.apply(&mut settings);
        if let Some(ms) = self.delay_ms {
            settings.delay_ms = ms;
        }

        let mut catalog = self.catalog.load(&settings)?;
        if let Some(group) = self.group.as_deref() {
            catalog.retain_group(group);
            if catalog.groups.is_empty() {
                bail!("no group named '{group}' in the catalog");
            }
        }

        let remote = Remote::from_settings(&settings).context("remote store is not configured")?;
        let clock = SystemClock;
        let engine = Reconciler::new(&remote.store, &remote.storage, &remote.metadata, &clock);

        tracing::info!(
            groups = catalog.groups.len(),
            records = catalog.record_count(),
            delay_ms = settings.delay_ms,
            "starting sync"
        );
        let stop = stop_on_signal()?;
        let report = Sequencer::new(ThreadPacer, settings.delay())
            .with_stop_flag(stop)
            .run(&catalog, &engine);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }
        Ok(report.exit_code())
    }
}

/// Raise the returned flag on SIGINT or SIGTERM. The record in flight
/// finishes; the rest of the catalog is left for the next run.
fn stop_on_signal() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))
        .context("failed to install SIGTERM handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))
        .context("failed to install SIGINT handler")?;
    Ok(stop)
}

fn print_report(report: &RunReport) {
    for group in &report.groups {
        print_group(group);
    }
    if report.interrupted {
        println!("{}", "Run stopped before the end of the catalog.".yellow());
    }

    let line = format!("Total {}", summary_line(&report.total));
    if report.is_success() {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
}

fn print_group(group: &GroupReport) {
    let mark = if group.summary.is_success() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!("{mark} {}: {}", group.label(), summary_line(&group.summary));

    for failed in group.failures() {
        if let RecordOutcome::Failed(error) = &failed.outcome {
            println!(
                "    {} {} ({}): {}",
                "✗".red(),
                failed.display_name,
                failed.external_id,
                error
            );
        }
    }
}

/// `2 records: 1 created, 1 updated, 0 unchanged, 0 skipped, 0 failed`
fn summary_line(s: &SyncSummary) -> String {
    format!(
        "{} record{}: {} created, {} updated, {} unchanged, {} skipped, {} failed",
        s.total,
        if s.total == 1 { "" } else { "s" },
        s.created,
        s.updated,
        s.unchanged,
        s.skipped,
        s.failed
    )
}
