//! SDM UI CLI Library
//!
//! This crate provides the command-line interface for sdm-ui. It parses
//! arguments, merges them with the config file and drives the core
//! [`App`](sdm_ui_core::app::App) from one of several front ends.
//!
//! # Key Features
//!
//! - **Table Listing**: Cached data sources, most recently used first
//! - **Menu Selection**: Pick a data source through rofi or wofi
//! - **Fuzzy Finder**: Built-in terminal finder for the same list
//! - **Hidden Password Input**: Terminal prompt used when the keyring has no password
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing
//! - [`commands`]: Config merging and subcommand dispatch
//! - [`dmenu`]: External menu programs
//! - [`selection`]: Terminal fuzzy finder and password prompt
//!
//! # Examples
//!
//! ```bash
//! # Refresh the cache
//! sdm-ui -e me@example.com sync
//!
//! # Show the cache as a table, hiding production resources
//! sdm-ui -e me@example.com ls -b '.*prod.*'
//!
//! # Connect through wofi
//! sdm-ui dmenu --wofi
//!
//! # Connect through the terminal fuzzy finder
//! sdm-ui fzf
//! ```

pub mod cli_args;
pub mod commands;
pub mod dmenu;
pub mod selection;
