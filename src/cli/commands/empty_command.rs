//! Empty command feature.
//!
//! Erases the whole trash folder belonging to one media path, regardless of
//! age or free space.

use anyhow::Context;
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::eraser::{CollectingEraser, ImmediateEraser};
use crate::locations;
use crate::output::{self, OutputMode};
use crate::trashcan;

pub(crate) fn handle_empty(
    config: &Config,
    path: Option<PathBuf>,
    dry_run: bool,
    yes: bool,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| config.default_path.clone());
    let trash = locations::trash_folder(&path, &config.default_path)
        .with_context(|| format!("No trash folder for {}", path.display()))?;

    if !trash.is_dir() {
        if mode != OutputMode::Quiet {
            println!("No trash at {}", trash.display());
        }
        return Ok(());
    }

    if dry_run {
        let eraser = CollectingEraser::new();
        let report = trashcan::empty_trash(&trash, &eraser)?;
        if mode == OutputMode::VeryVerbose {
            for path in eraser.submitted() {
                println!("  {}", path.display());
            }
        }
        output::print_empty_report(&trash, &report, mode, true);
        return Ok(());
    }

    if !yes {
        print!(
            "Erase everything in {} ({})? [y/N]: ",
            trash.display().to_string().bold(),
            bytesize::to_string(trashcan::trash_size(&trash), true).yellow()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", "Cancelled.".dimmed());
            return Ok(());
        }
    }

    // Synchronous erase so emptied directories can be pruned in the same walk
    let report = trashcan::empty_trash(&trash, &ImmediateEraser)?;
    output::print_empty_report(&trash, &report, mode, false);
    Ok(())
}
