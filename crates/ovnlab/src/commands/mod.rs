//! Command dispatch: routes parsed CLI commands to their handlers.

pub mod build;
pub mod config_cmd;
pub mod destroy;
pub mod util;
pub mod validate;

use crate::cli::{Command, GlobalOpts};
use crate::config::Settings;
use crate::error::CliError;

/// Dispatch a parsed command. `completions` never reaches here.
pub async fn dispatch(
    command: Command,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        Command::Build(args) => build::handle(&args, settings, global).await,
        Command::Destroy(args) => destroy::handle(&args, settings, global).await,
        Command::Validate(args) => validate::handle(&args, global),
        Command::Config(args) => config_cmd::handle(&args, settings, global),
        Command::Completions(_) => Ok(()),
    }
}
