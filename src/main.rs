use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use glas_offline::cli::args::{Cli, Commands};
use glas_offline::cli::commands::{self, Session};
use glas_offline::config::ColorSetting;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let session = Session::open(&cli)?;
    let format = cli.output.unwrap_or(session.config.general.default_output);
    match session.config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {},
    }

    let output = match cli.command {
        Commands::Status => commands::status(&session, format)?,
        Commands::List { dead } => commands::list(&session, dead, format)?,
        Commands::Enqueue(args) => commands::enqueue(&session, args.command, format)?,
        Commands::Sync { offline } => commands::sync(&session, offline, format)?,
        Commands::Retry { id, all } => commands::retry(&session, id.as_deref(), all, format)?,
        Commands::Discard { id, all, force } => {
            commands::discard(&session, id.as_deref(), all, force, format)?
        },
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("GLAS_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
