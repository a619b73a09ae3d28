//! Subcommand dispatch.
//!
//! Turns parsed arguments and the optional config file into a [`Config`],
//! then runs the chosen subcommand against an [`App`].

use std::io::stdout;
use std::process::ExitCode;
use std::time::Duration;

use log::{debug, info, warn};
use sdm_ui_core::app::App;
use sdm_ui_core::config::{get_db_directory, Config, FileConfig, PromptKind};
use sdm_ui_core::credentials::{PasswordPrompt, ZenityPrompt};
use sdm_ui_core::error::{Error, Result};
use sdm_ui_core::listing::render_rows;
use sdm_ui_core::recovery::TITLE_RESOURCE_NOT_FOUND;

use crate::cli_args::{Args, Commands};
use crate::dmenu::{entry_name, select_with_menu};
use crate::selection::{prompt_for_data_source, SourceChoice, TerminalPrompt};

/// Merges command-line flags over the config file.
///
/// The subcommand decides the front end: `dmenu` uses its menu program and a
/// graphical password dialog, everything else prompts on the terminal.
///
/// # Errors
///
/// Returns [`Error::MissingAccount`] if neither the flags nor the file name
/// an account.
pub fn build_config(args: &Args, file_config: Option<FileConfig>) -> Result<Config> {
    let mut config = Config::from_file_config(file_config.unwrap_or_default());

    if let Some(email) = &args.email {
        config.account = email.clone();
    }

    if args.db_path.is_some() {
        config.db_directory = get_db_directory(&args.db_path);
    }

    config.verbose = config.verbose || args.verbose;

    if !args.blacklist.is_empty() {
        config.blacklist_patterns = args.blacklist.clone();
    }

    if let Some(timeout) = args.timeout {
        config.timeout = Duration::from_secs(timeout);
    }

    match &args.command {
        Commands::Dmenu(dmenu) => {
            config.menu = Some(dmenu.menu());
            config.password_prompt = PromptKind::Zenity;
        }
        _ => {
            config.menu = None;
            config.password_prompt = PromptKind::Terminal;
        }
    }

    if config.account.trim().is_empty() {
        return Err(Error::MissingAccount);
    }

    debug!("Resolved config: {config:?}");
    Ok(config)
}

fn password_prompt(kind: PromptKind) -> Box<dyn PasswordPrompt> {
    match kind {
        PromptKind::Zenity => Box::new(ZenityPrompt),
        PromptKind::Terminal => Box::new(TerminalPrompt),
    }
}

/// Runs `command` with the resolved configuration.
///
/// # Errors
///
/// Returns whatever the subcommand fails with. A dismissed menu or finder is
/// not an error.
pub fn run(command: &Commands, config: Config) -> Result<()> {
    let prompt = password_prompt(config.password_prompt);
    let mut app = App::from_config(config, prompt)?;

    match command {
        Commands::Sync => {
            let count = app.sync()?;
            info!("Synced {count} data sources");
            Ok(())
        }
        Commands::List => app.list(&mut stdout().lock(), true),
        Commands::Dmenu(_) => run_dmenu(&mut app),
        Commands::Fzf => run_fzf(&mut app),
        Commands::Wipe => {
            let removed = app.wipe()?;
            info!(
                "Removed {removed} cache namespaces for `{}`",
                app.config().account
            );
            Ok(())
        }
    }
}

fn run_dmenu(app: &mut App) -> Result<()> {
    let Some(menu) = app.config().menu else {
        return Err(Error::Misc("No menu program configured".to_string()));
    };

    let lines = render_rows(&app.data_sources()?, false);

    let Some(line) = select_with_menu(menu, &lines)? else {
        debug!("No data source selected");
        return Ok(());
    };

    match entry_name(&line) {
        Some(name) => {
            app.connect(name)?;
            Ok(())
        }
        None => {
            warn!("Could not read a data source name from `{line}`");
            app.notifier().notify(TITLE_RESOURCE_NOT_FOUND, &line);
            Ok(())
        }
    }
}

fn run_fzf(app: &mut App) -> Result<()> {
    let data_sources = app.data_sources()?;

    match prompt_for_data_source(&data_sources)? {
        SourceChoice::Index(index) => {
            app.connect(&data_sources[index].name)?;
            Ok(())
        }
        SourceChoice::Cancelled => {
            debug!("No data source selected");
            Ok(())
        }
    }
}

/// Process exit code for the outcome of a run.
///
/// A dismissed prompt, menu or finder is a successful run.
pub fn exit_code_for(result: &Result<()>) -> ExitCode {
    match result {
        Ok(()) | Err(Error::Cancelled) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}
