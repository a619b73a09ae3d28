use std::process::ExitCode;

use clap::Parser;
use log::{debug, LevelFilter};
use sdm_ui_cli::cli_args::Args;
use sdm_ui_cli::commands;
use sdm_ui_core::config;
use sdm_ui_core::error::{Error, Result};

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // RUST_LOG still wins over the flag
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn execute() -> Result<()> {
    let args = Args::parse();

    let config_path = config::get_config_path(&args.config_path);
    let file_config = config::load_file_config(&config_path)?;
    let config = commands::build_config(&args, file_config)?;

    init_logging(config.verbose);
    debug!("Config path: `{}`", config_path);

    commands::run(&args.command, config)
}

fn main() -> ExitCode {
    let result = execute();

    if let Err(e) = &result {
        if !matches!(e, Error::Cancelled) {
            eprintln!("Error: {e}");
        }
    }

    commands::exit_code_for(&result)
}
