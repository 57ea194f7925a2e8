use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::logging;
use crate::output::OutputMode;

pub(crate) mod commands {
    pub(crate) mod clean_command;
    pub(crate) mod config_command;
    pub(crate) mod empty_command;
    pub(crate) mod history_command;
    pub(crate) mod info_command;
}

#[derive(Parser)]
#[command(name = "trashkeeper")]
#[command(version)]
#[command(about = "Reclaim disk space from recorder trash folders")]
#[command(long_about = "trashkeeper deletes files from the .Trash folder of every mounted \
    volume once they are older than the retention period, and removes younger ones \
    oldest-first while a volume is short of its reserved free space.\n\n\
    Examples:\n  \
    trashkeeper clean                    # Run one cleanup pass now\n  \
    trashkeeper clean --dry-run -vv      # Show what a pass would erase\n  \
    trashkeeper clean --days 0 --reserve-gb 100\n  \
    trashkeeper info --path /media/hdd/movie")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one cleanup pass over all trash folders
    #[command(visible_alias = "c")]
    Clean {
        /// Report what would be erased without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Retention in days (0 = quota only) [default: from config]
        #[arg(long, value_name = "DAYS")]
        days: Option<u64>,

        /// Free space to keep per volume in GiB [default: from config]
        #[arg(long, value_name = "GB")]
        reserve_gb: Option<u64>,

        /// Run even if cleanup is disabled in the config
        #[arg(long)]
        force: bool,

        /// Output the pass report as JSON
        #[arg(long)]
        json: bool,

        /// Don't save the pass to history
        #[arg(long)]
        no_log: bool,
    },

    /// Erase everything in the trash folder for a path
    Empty {
        /// Media path whose trash to empty [default: default_path]
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        /// List what would be erased without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Show the trash folder and its usage for a path
    #[command(visible_alias = "i")]
    Info {
        /// Media path to inspect [default: default_path]
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Create the trash folder if it is missing
        #[arg(long)]
        create: bool,

        #[arg(long)]
        json: bool,
    },

    /// List every trash folder a pass would visit
    #[command(visible_alias = "l")]
    Locations {
        #[arg(long)]
        json: bool,
    },

    /// View or modify configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,

        /// Print the config file location
        #[arg(long)]
        path: bool,
    },

    /// List saved cleanup passes
    History {
        /// Number of passes to show
        #[arg(long, default_value = "10", value_name = "N")]
        limit: usize,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn run(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
        .context("Failed to load configuration")?;

        logging::init(&logging::level_for(
            self.verbose,
            self.quiet,
            &config.log_level,
        ));
        let mode = OutputMode::from_flags(self.verbose, self.quiet);

        match self.command {
            Commands::Clean {
                dry_run,
                days,
                reserve_gb,
                force,
                json,
                no_log,
            } => commands::clean_command::handle_clean(
                config,
                commands::clean_command::CleanOptions {
                    dry_run,
                    days,
                    reserve_gb,
                    force,
                    json,
                    save_log: !no_log,
                },
                mode,
            ),
            Commands::Empty { path, dry_run, yes } => {
                commands::empty_command::handle_empty(&config, path, dry_run, yes, mode)
            }
            Commands::Info { path, create, json } => {
                commands::info_command::handle_info(&config, path, create, json, mode)
            }
            Commands::Locations { json } => {
                commands::info_command::handle_locations(&config, json, mode)
            }
            Commands::Config { show, reset, path } => {
                commands::config_command::handle_config(&config, self.config, show, reset, path)
            }
            Commands::History { limit } => commands::history_command::handle_history(limit, mode),
        }
    }
}
