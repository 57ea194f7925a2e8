//! Clean command feature.
//!
//! Runs one reclamation pass on the calling thread, bypassing the recording
//! check but not the single-flight guard.

use anyhow::Context;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::{Config, GIB};
use crate::eraser::{BackgroundEraser, CollectingEraser, Eraser};
use crate::history::PassLog;
use crate::mounts::ProcMounts;
use crate::output::{self, OutputMode};
use crate::policy::RetentionLimit;
use crate::progress;
use crate::space::SystemSpace;
use crate::trashcan::{Collaborators, RecordingCounter, Trashcan};

pub(crate) struct CleanOptions {
    pub dry_run: bool,
    pub days: Option<u64>,
    pub reserve_gb: Option<u64>,
    pub force: bool,
    pub json: bool,
    pub save_log: bool,
}

pub(crate) fn collaborators(config: &Config, eraser: Arc<dyn Eraser>) -> Collaborators {
    Collaborators {
        mounts: Arc::new(ProcMounts::new(&config.mounts_file)),
        space: Arc::new(SystemSpace),
        eraser,
        recordings: Arc::new(RecordingCounter::default()),
    }
}

pub(crate) fn handle_clean(
    mut config: Config,
    opts: CleanOptions,
    mode: OutputMode,
) -> anyhow::Result<()> {
    if opts.force {
        config.enabled = true;
    }
    if !config.enabled {
        if mode != OutputMode::Quiet {
            println!("Trash cleanup is disabled in the config (use --force to run anyway).");
        }
        return Ok(());
    }

    let days = opts.days.unwrap_or(config.retention_days);
    let reserve_bytes = opts
        .reserve_gb
        .map(|gb| gb.saturating_mul(GIB))
        .unwrap_or_else(|| config.reserve_bytes());
    let limit = RetentionLimit::from_days(days, SystemTime::now());

    let spinner = if opts.json {
        None
    } else {
        progress::spinner(mode, "Cleaning trash folders...")
    };

    let report = if opts.dry_run {
        let eraser = Arc::new(CollectingEraser::new());
        let parts = collaborators(&config, eraser);
        let trashcan = Trashcan::new(config, parts);
        trashcan.run_pass(limit, reserve_bytes)
    } else {
        let eraser = Arc::new(
            BackgroundEraser::spawn().context("Failed to start the background eraser")?,
        );
        let parts = collaborators(&config, eraser.clone());
        let trashcan = Trashcan::new(config, parts);
        let report = trashcan.run_pass(limit, reserve_bytes);
        drop(trashcan);
        // Last reference: wait for queued deletions
        if let Ok(eraser) = Arc::try_unwrap(eraser) {
            let summary = eraser.finish();
            tracing::info!(
                erased = summary.erased,
                vanished = summary.vanished,
                failed = summary.failed,
                "eraser finished"
            );
        }
        report
    };
    progress::finish(spinner);

    let report = report.context("A cleanup pass is already running")?;

    if opts.json {
        output::print_json(&report)?;
    } else {
        output::print_pass_report(&report, mode, opts.dry_run);
    }

    if opts.save_log && report.files_submitted() > 0 {
        match PassLog::from_report(&report, opts.dry_run).save() {
            Ok(path) => tracing::debug!(path = %path.display(), "pass log saved"),
            Err(e) => tracing::warn!("Failed to save pass log: {e:#}"),
        }
    }

    Ok(())
}
