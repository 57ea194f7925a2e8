//! Config command feature.

use anyhow::Context;
use colored::*;
use std::path::PathBuf;

use crate::config::{self, Config};

pub(crate) fn handle_config(
    current: &Config,
    explicit_path: Option<PathBuf>,
    show: bool,
    reset: bool,
    path: bool,
) -> anyhow::Result<()> {
    let location = match explicit_path {
        Some(p) => p,
        None => config::config_path()?,
    };

    if reset {
        Config::default()
            .save_to(&location)
            .with_context(|| format!("Failed to write {}", location.display()))?;
        println!("{} {}", "Reset configuration at".green(), location.display());
        return Ok(());
    }

    if path {
        println!("{}", location.display());
        return Ok(());
    }

    // --show prints bare TOML
    if !show {
        if location.exists() {
            println!("{}", format!("# {}", location.display()).dimmed());
        } else {
            println!("{}", "# defaults (no config file yet)".dimmed());
        }
    }
    print!("{}", toml::to_string_pretty(current)?);
    Ok(())
}
