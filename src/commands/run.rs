//! `install`, `update` and `uninstall`.

use crate::Context;
use crate::cli::OperationArgs;
use crate::commands::{Defaults, build_request, host_engine, load_config};
use crate::{progress, ui};
use anyhow::Result;
use edgeplan::domain::{OperationKind, WizardRequest};
use edgeplan::{CancellationToken, ExitCode, WizardExecutionResult};

pub fn run(
    ctx: &Context,
    operation: OperationKind,
    args: &OperationArgs,
    purge_data: bool,
) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let mut request = build_request(operation, &args.request, &config, &Defaults::resolve()?)?;
    request.dry_run = args.dry_run;
    request.auto_approve = args.yes;
    request.non_interactive = args.non_interactive;
    request.purge_data = purge_data;

    let engine = host_engine()?;
    let cancel = CancellationToken::new();

    let pb = progress::spinner("Fetching manifest...", ctx.shows_progress());
    let planned = engine.plan(&request, &cancel);
    progress::finish_clear(&pb);

    let plan = match planned {
        Ok(plan) => plan,
        Err(e) => {
            let result = WizardExecutionResult::from_error(&e, request.dry_run);
            report(ctx, &result)?;
            return Ok(result.exit_code);
        }
    };

    if !plan.is_empty() && needs_confirmation(&request, console::Term::stderr().is_term()) {
        if !ctx.json {
            ui::print_plan(&plan);
            println!();
        }
        if !confirm_proceed()? {
            if !ctx.json {
                ui::notice("Operation cancelled by operator.");
            }
            return Ok(ExitCode::Success);
        }
    }

    let pb = progress::spinner(
        &format!("Running {}...", ui::plural(plan.len(), "step")),
        ctx.shows_progress(),
    );
    let result = engine.run_plan(&request, plan, &cancel);
    progress::finish_clear(&pb);

    report(ctx, &result)?;
    Ok(result.exit_code)
}

/// Whether to ask before running a non-empty plan.
pub fn needs_confirmation(request: &WizardRequest, attended: bool) -> bool {
    attended && !request.dry_run && !request.auto_approve && !request.non_interactive
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print the final outcome, as text or as the JSON report.
pub fn report(ctx: &Context, result: &WizardExecutionResult) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&result.report())?);
    } else {
        ui::print_outcome(result, ctx.quiet, ctx.verbose > 0);
    }
    Ok(())
}
