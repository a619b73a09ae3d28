//! Command-line argument parsing.
//!
//! This module defines the command-line interface structure using the `clap`
//! crate. Global flags apply to every subcommand and take precedence over the
//! configuration file.

use clap::{Parser, Subcommand};
use sdm_ui_core::config::MenuProgram;

/// Command-line arguments for the `sdm-ui` binary.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use sdm_ui_cli::cli_args::{Args, Commands};
///
/// let args = Args::parse_from(["sdm-ui", "--email", "me@example.com", "ls"]);
/// assert_eq!(args.command, Commands::List);
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "sdm-ui",
    version,
    about = "Connect to strongDM data sources from a menu or fuzzy finder"
)]
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Account email used to log in to strongDM.
    ///
    /// Required unless `email` is set in the config file.
    #[arg(long, short = 'e', global = true)]
    pub email: Option<String>,

    /// Enable debug logging.
    #[arg(long, short = 'v', global = true, action)]
    pub verbose: bool,

    /// Directory holding the data source cache.
    ///
    /// If not provided, defaults to `~/.local/share`.
    #[arg(long = "db", short = 'd', global = true)]
    pub db_path: Option<String>,

    /// Path to the YAML config file.
    ///
    /// If not provided, defaults to `~/.config/sdm-ui.yaml`.
    #[arg(long = "config", global = true)]
    pub config_path: Option<String>,

    /// Regex for data source names to hide. May be repeated.
    ///
    /// Replaces the `blacklistPatterns` from the config file when given.
    #[arg(long, short = 'b', global = true, action = clap::ArgAction::Append)]
    pub blacklist: Vec<String>,

    /// Seconds to wait for each `sdm` invocation.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Refresh the cache from `sdm status`.
    Sync,

    /// Print the cached data sources as a table.
    #[command(visible_alias = "ls")]
    List,

    /// Pick a data source with rofi or wofi and connect to it.
    Dmenu(DmenuArgs),

    /// Pick a data source with the built-in fuzzy finder and connect to it.
    Fzf,

    /// Delete every cached record of the account.
    Wipe,
}

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DmenuArgs {
    /// Use wofi.
    #[arg(long, short = 'w', action, conflicts_with = "rofi")]
    pub wofi: bool,

    /// Use rofi (the default).
    #[arg(long, short = 'r', action)]
    pub rofi: bool,
}

impl DmenuArgs {
    /// The menu program to launch.
    pub fn menu(&self) -> MenuProgram {
        if self.wofi {
            MenuProgram::Wofi
        } else {
            MenuProgram::Rofi
        }
    }
}
