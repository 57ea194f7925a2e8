//! Info and locations command features.

use anyhow::Context;
use std::path::PathBuf;

use crate::config::Config;
use crate::locations;
use crate::mounts::{MountTable, ProcMounts};
use crate::output::{self, OutputMode, TrashInfo};
use crate::trashcan;

pub(crate) fn handle_info(
    config: &Config,
    path: Option<PathBuf>,
    create: bool,
    json: bool,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| config.default_path.clone());

    let trash = if create {
        let created = locations::create_trash_folder(&path, &config.default_path);
        if created.is_none() {
            tracing::warn!(path = %path.display(), "could not create trash folder");
        }
        created
    } else {
        locations::trash_folder(&path, &config.default_path)
    };

    let size_bytes = trash.as_deref().map(trashcan::trash_size).unwrap_or(0);
    let info = TrashInfo {
        is_trash: locations::is_trash_folder(&path, &config.default_path),
        usage: trashcan::format_trash_usage(size_bytes),
        path,
        trash,
        size_bytes,
    };

    if json {
        output::print_json(&info)
    } else {
        output::print_info(&info, mode);
        Ok(())
    }
}

pub(crate) fn handle_locations(config: &Config, json: bool, mode: OutputMode) -> anyhow::Result<()> {
    let mounts = ProcMounts::new(&config.mounts_file)
        .entries()
        .context("Failed to read the mount table")?;
    let found = locations::trash_locations(&config.default_path, &mounts, config.clean_network);

    if json {
        output::print_json(&found)
    } else {
        output::print_locations(&found, mode);
        Ok(())
    }
}
