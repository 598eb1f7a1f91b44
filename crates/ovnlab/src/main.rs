mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Completions need neither settings nor logging.
    if let Command::Completions(args) = &cli.command {
        clap_complete::generate(
            args.shell,
            &mut Cli::command(),
            "ovnlab",
            &mut std::io::stdout(),
        );
        return;
    }

    let code = match run(cli).await {
        Ok(()) => exit_code::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = match config::resolve_settings(&cli.global) {
        Ok(settings) => settings,
        Err(err) => {
            init_tracing(cli.global.log_level.as_deref().unwrap_or("warn"), cli.global.json_logs);
            return Err(err);
        }
    };
    init_tracing(&settings.log_level, settings.json_logs);

    commands::dispatch(cli.command, &settings, &cli.global).await
}

/// `RUST_LOG` wins; otherwise the resolved log level applies. Logs always go
/// to stderr so stdout stays parseable.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
