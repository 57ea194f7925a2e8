use crate::policy::{PassReport, Reason};
use crate::trashcan::{self, EmptyReport};
use colored::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // Per-location details
    VeryVerbose, // Every submitted file
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose >= 2 {
            OutputMode::VeryVerbose
        } else if verbose == 1 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

fn human(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

pub fn print_pass_report(report: &PassReport, mode: OutputMode, dry_run: bool) {
    if mode == OutputMode::Quiet {
        return;
    }

    if dry_run {
        println!("{}", "DRY RUN - no files were deleted".yellow().bold());
        println!();
    }

    for location in report.locations.iter().filter(|l| l.scanned) {
        println!("{}", location.location.display().to_string().bold());
        println!(
            "  size {}, free {}, aged {}, quota {}, {} left",
            human(location.trash_bytes).cyan(),
            human(location.free_bytes).cyan(),
            location.submitted_count(Reason::Aged).to_string().green(),
            location.submitted_count(Reason::Quota).to_string().green(),
            human(location.remaining_bytes).cyan()
        );
        if mode == OutputMode::VeryVerbose {
            for s in &location.submitted {
                let tag = match s.reason {
                    Reason::Aged => "aged ".dimmed(),
                    Reason::Quota => "quota".dimmed(),
                };
                println!("    {} {} ({})", tag, s.path.display(), human(s.size));
            }
        }
        if mode != OutputMode::Normal {
            println!(
                "  {} dirs removed, {} preserved, {} vanished, {} errors",
                location.dirs_removed, location.preserved, location.vanished, location.errors
            );
        }
    }

    if mode != OutputMode::Normal {
        for location in report.locations.iter().filter(|l| !l.scanned) {
            println!("{}", format!("{} (absent)", location.location.display()).dimmed());
        }
    }

    for failed in &report.failed {
        eprintln!(
            "{} {}: {}",
            "Warning:".yellow(),
            failed.location.display(),
            failed.error
        );
    }

    println!();
    let verb = if dry_run { "would erase" } else { "erasing" };
    println!(
        "{} {} files ({}), {} dirs removed",
        if report.failed.is_empty() {
            "[OK]".green()
        } else {
            "[WARNING]".yellow()
        },
        format!("{verb} {}", report.files_submitted()).bold(),
        human(report.bytes_submitted()).green(),
        report.dirs_removed()
    );
}

pub fn print_empty_report(trash: &Path, report: &EmptyReport, mode: OutputMode, dry_run: bool) {
    if mode == OutputMode::Quiet {
        return;
    }
    let verb = if dry_run { "Would erase" } else { "Erased" };
    println!(
        "{} {} files ({}) from {}, {} dirs removed",
        verb,
        report.files.to_string().bold(),
        human(report.bytes).green(),
        trash.display(),
        report.dirs_removed
    );
}

pub fn print_locations(locations: &BTreeSet<PathBuf>, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    for location in locations {
        if location.is_dir() {
            println!(
                "{} {}",
                location.display().to_string().bold(),
                human(trashcan::trash_size(location)).cyan()
            );
        } else {
            println!("{}", location.display().to_string().dimmed());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrashInfo {
    pub path: PathBuf,
    pub trash: Option<PathBuf>,
    pub is_trash: bool,
    pub size_bytes: u64,
    pub usage: String,
}

pub fn print_info(info: &TrashInfo, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    match &info.trash {
        Some(trash) => {
            println!("{} {}", "Trash folder:".bold(), trash.display());
            if info.is_trash {
                println!("{}", "(the path itself is a trash folder)".dimmed());
            }
            println!("{}", info.usage.cyan());
        }
        None => println!("{}", "-?-".dimmed()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(OutputMode::from_flags(0, false), OutputMode::Normal);
        assert_eq!(OutputMode::from_flags(1, false), OutputMode::Verbose);
        assert_eq!(OutputMode::from_flags(5, false), OutputMode::VeryVerbose);
        assert_eq!(OutputMode::from_flags(2, true), OutputMode::Quiet);
    }

    #[test]
    fn test_print_quiet_is_silent() {
        // Nothing to assert on stdout; exercising the early return path
        let report = PassReport {
            started: chrono::Utc::now(),
            locations: Vec::new(),
            failed: Vec::new(),
        };
        print_pass_report(&report, OutputMode::Quiet, false);
        print_empty_report(Path::new("/x"), &EmptyReport::default(), OutputMode::Quiet, true);
    }
}
