//! `plan`: build and show a plan without running it.

use crate::Context;
use crate::cli::RequestArgs;
use crate::commands::{Defaults, build_request, host_engine, load_config, run};
use crate::{progress, ui};
use anyhow::Result;
use edgeplan::domain::OperationKind;
use edgeplan::{CancellationToken, ExitCode, WizardExecutionResult};

pub fn run(
    ctx: &Context,
    operation: OperationKind,
    args: &RequestArgs,
    purge_data: bool,
) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let mut request = build_request(operation, args, &config, &Defaults::resolve()?)?;
    request.dry_run = true;
    request.purge_data = purge_data;

    let engine = host_engine()?;
    let pb = progress::spinner("Building plan...", ctx.shows_progress());
    let planned = engine.plan(&request, &CancellationToken::new());
    progress::finish_clear(&pb);

    let plan = match planned {
        Ok(plan) => plan,
        Err(e) => {
            let result = WizardExecutionResult::from_error(&e, true);
            run::report(ctx, &result)?;
            return Ok(result.exit_code);
        }
    };

    if !ctx.json {
        ui::print_plan(&plan);
        println!();
        if !plan.is_empty() {
            ui::notice(&format!(
                "{} planned. Nothing was changed.",
                ui::plural(plan.len(), "step")
            ));
        }
        return Ok(ExitCode::Success);
    }

    let message = if plan.is_empty() {
        "No changes are required.".to_string()
    } else {
        format!("{} planned.", ui::plural(plan.len(), "step"))
    };
    let result = WizardExecutionResult {
        exit_code: ExitCode::Success,
        succeeded: true,
        dry_run: true,
        message,
        plan: Some(plan),
        run_result: None,
    };
    run::report(ctx, &result)?;
    Ok(ExitCode::Success)
}
