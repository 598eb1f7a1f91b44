//! Build subcommand: converge the Northbound database toward a lab.

use crate::cli::{BuildArgs, GlobalOpts};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output::{self, Styles};

use super::util;

pub async fn handle(
    args: &BuildArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let topology = util::load_topology(&args.lab.config)?;
    let settings = config::with_socket_dir(settings, args.backend.socket_dir.as_deref());
    let session = util::connect(&settings).await?;
    let styles = Styles::for_mode(global.color);

    let plan = session
        .reconciler
        .plan_build(&topology)
        .await
        .map_err(|e| session.error(e))?;
    if args.backend.dry_run {
        let text = output::render_plan(&plan, global.output, &styles)?;
        output::print_output(&text, global.quiet);
        return Ok(());
    }

    let report = session
        .reconciler
        .apply(plan)
        .await
        .map_err(|e| session.error(e))?;
    let text = output::render_report(&report, global.output, &styles)?;
    output::print_output(&text, global.quiet);
    Ok(())
}
