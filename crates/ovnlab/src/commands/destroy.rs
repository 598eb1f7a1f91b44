//! Destroy subcommand: delete everything a lab owns, children first.

use tracing::info;

use crate::cli::{DestroyArgs, GlobalOpts};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output::{self, Styles};

use super::util;

pub async fn handle(
    args: &DestroyArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let topology = util::load_topology(&args.lab.config)?;
    if !args.backend.dry_run {
        util::require_interactive("destroy", args.yes)?;
    }

    let settings = config::with_socket_dir(settings, args.backend.socket_dir.as_deref());
    let session = util::connect(&settings).await?;
    let styles = Styles::for_mode(global.color);

    let plan = session
        .reconciler
        .plan_destroy(&topology)
        .await
        .map_err(|e| session.error(e))?;
    if args.backend.dry_run {
        let text = output::render_plan(&plan, global.output, &styles)?;
        output::print_output(&text, global.quiet);
        return Ok(());
    }

    if !plan.is_empty() {
        let prompt = format!(
            "Delete {} object(s) of VPC '{}'?",
            plan.operations.len(),
            plan.vpc
        );
        if !util::confirm(&prompt, args.yes)? {
            info!(vpc = %plan.vpc, "destroy cancelled");
            return Ok(());
        }
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
