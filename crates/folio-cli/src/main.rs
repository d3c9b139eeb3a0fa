//! Folio CLI - Command-line interface for the archive dedup engine.

use clap::Parser;
use folio_cli::cli::ConfigAction;
use folio_cli::commands;
use folio_cli::{Cli, Command, Config, Formatter};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    let _ = set_global_default(subscriber);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> folio_cli::Result<()> {
    let path = Config::path(cli.config.as_deref())?;

    // Only `config show` and `run` need a readable file
    let config = match &cli.command {
        Command::Config(args) if !matches!(args.action, ConfigAction::Show) => Config::default(),
        _ => Config::load_from(&path)?,
    };

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Run(args) => commands::execute_run(args, &config, &formatter).await?,
        Command::Import(args) => commands::execute_import(args, &formatter)?,
        Command::Config(args) => commands::execute_config(args, &path, &config, &formatter)?,
    }

    Ok(())
}
