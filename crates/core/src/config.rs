//! Configuration for sdm-ui.
//!
//! Settings come from an optional YAML file and from command-line flags;
//! flags win. This module resolves paths, loads the file and holds the
//! merged [`Config`] the rest of the crate runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::classifier::ErrorPattern;
use crate::error::{Error, Result};
use crate::execution::DEFAULT_TIMEOUT;

/// Default path for the configuration file
const DEFAULT_CONFIG_PATH: &str = "~/.config/sdm-ui.yaml";
/// Default directory holding the cache file
const DEFAULT_DB_DIRECTORY: &str = "~/.local/share";

/// Name of the strongDM executable looked up in `PATH`
pub const DEFAULT_SDM_EXECUTABLE: &str = "sdm";

/// Resolves the configuration file path.
///
/// If a custom path is provided, uses that path. Otherwise, uses the default
/// configuration path. Shell expansions like `~` are resolved.
///
/// # Examples
///
/// ```
/// use sdm_ui_core::config::get_config_path;
///
/// let default_path = get_config_path(&None);
/// assert!(default_path.ends_with("sdm-ui.yaml"));
///
/// let custom_path = get_config_path(&Some("/etc/sdm-ui.yaml".to_string()));
/// assert_eq!(custom_path, "/etc/sdm-ui.yaml");
/// ```
pub fn get_config_path(config_path_arg: &Option<String>) -> String {
    let config_path = config_path_arg.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    shellexpand::tilde(config_path).to_string()
}

/// Resolves the directory that holds the cache file, expanding `~`.
pub fn get_db_directory(db_directory_arg: &Option<String>) -> PathBuf {
    let db_directory = db_directory_arg.as_deref().unwrap_or(DEFAULT_DB_DIRECTORY);

    PathBuf::from(shellexpand::tilde(db_directory).as_ref())
}

/// Contents of the YAML configuration file. Every key is optional.
///
/// ```yaml
/// email: me@example.com
/// dbPath: ~/.local/share
/// verbose: false
/// blacklistPatterns:
///   - ".*prod.*"
/// timeoutSecs: 30
/// errorPatterns:
///   - pattern: "MFA required"
///     kind: Unauthorized
/// ```
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    pub email: Option<String>,
    #[serde(alias = "db")]
    pub db_path: Option<String>,
    pub verbose: Option<bool>,
    pub blacklist_patterns: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub sdm_executable: Option<String>,
    pub error_patterns: Option<Vec<ErrorPattern>>,
}

/// Reads the configuration file at `path`.
///
/// A missing file is not an error and yields `None`; an empty file yields
/// the default (all unset) configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The file exists but cannot be opened
/// - The YAML is malformed or has keys of the wrong type
pub fn load_file_config(path: &str) -> Result<Option<FileConfig>> {
    if !Path::new(path).exists() {
        debug!("No config file at `{path}`");
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::io_error("config".to_string(), path.to_string(), e))?;

    if contents.trim().is_empty() {
        debug!("Config file at `{path}` is empty");
        return Ok(Some(FileConfig::default()));
    }

    let parsed: serde_yaml::Result<FileConfig> = serde_yaml::from_str(&contents);

    match parsed {
        Ok(file_config) => {
            debug!("Loaded config from `{path}`");
            Ok(Some(file_config))
        }
        Err(e) => Err(Error::yaml_error(
            "reading".to_string(),
            "config".to_string(),
            path.to_string(),
            e,
        )),
    }
}

/// Menu program used by the `dmenu` front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuProgram {
    Rofi,
    Wofi,
}

impl MenuProgram {
    pub fn binary(&self) -> &'static str {
        match self {
            MenuProgram::Rofi => "rofi",
            MenuProgram::Wofi => "wofi",
        }
    }
}

/// How to ask for a password that is not in the keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Graphical `zenity` dialog.
    Zenity,
    /// Hidden input on the controlling terminal.
    Terminal,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub account: String,
    pub db_directory: PathBuf,
    pub verbose: bool,
    pub blacklist_patterns: Vec<String>,
    /// Deadline for each `sdm` invocation.
    pub timeout: Duration,
    pub sdm_executable: String,
    /// `None` when no external menu is used.
    pub menu: Option<MenuProgram>,
    pub password_prompt: PromptKind,
    /// Consulted before the built-in classification table.
    pub error_patterns: Vec<ErrorPattern>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: String::new(),
            db_directory: get_db_directory(&None),
            verbose: false,
            blacklist_patterns: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            sdm_executable: DEFAULT_SDM_EXECUTABLE.to_string(),
            menu: None,
            password_prompt: PromptKind::Terminal,
            error_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Starts from the defaults with the file's values applied on top.
    pub fn from_file_config(file_config: FileConfig) -> Self {
        let defaults = Self::default();

        Self {
            account: file_config.email.unwrap_or(defaults.account),
            db_directory: file_config
                .db_path
                .map_or(defaults.db_directory, |path| get_db_directory(&Some(path))),
            verbose: file_config.verbose.unwrap_or(defaults.verbose),
            blacklist_patterns: file_config
                .blacklist_patterns
                .unwrap_or(defaults.blacklist_patterns),
            timeout: file_config
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            sdm_executable: file_config
                .sdm_executable
                .unwrap_or(defaults.sdm_executable),
            error_patterns: file_config.error_patterns.unwrap_or_default(),
            ..defaults
        }
    }
}
