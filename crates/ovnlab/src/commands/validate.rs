//! Validate subcommand: parse, validate and expand a lab without touching OVN.

use tracing::info;

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::error::CliError;
use crate::output::{self, Styles};

use super::util;

pub fn handle(args: &ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let topology = util::load_topology(&args.lab.config)?;
    info!(
        vpc = %topology.vpc,
        objects = topology.desired_objects().len(),
        "lab is valid"
    );

    let styles = Styles::for_mode(global.color);
    let text = output::render_topology(&topology, global.output, &styles)?;
    output::print_output(&text, global.quiet);
    Ok(())
}
