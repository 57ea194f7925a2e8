//! History command feature.

use colored::*;

use crate::history;
use crate::output::OutputMode;

pub(crate) fn handle_history(limit: usize, mode: OutputMode) -> anyhow::Result<()> {
    let dir = history::history_dir()?;
    let logs = history::list_logs(&dir)?;

    if logs.is_empty() {
        if mode != OutputMode::Quiet {
            println!("{}", "No saved cleanup passes.".dimmed());
        }
        return Ok(());
    }

    for path in logs.iter().take(limit) {
        match history::load_log(path) {
            Ok(log) => {
                println!(
                    "{}  {}",
                    log.started.format("%Y-%m-%d %H:%M:%S").to_string().bold(),
                    log.summary()
                );
                for failed in &log.failed_locations {
                    println!("    {} {}", "failed:".yellow(), failed);
                }
            }
            Err(e) => eprintln!("{} {:#}", "Warning:".yellow(), e),
        }
    }
    Ok(())
}
