//! Orchestration: validate, load, fetch, plan, run, classify.

use crate::backend::{ManifestClient, ManifestQuery, StateStore};
use crate::cancel::CancellationToken;
use crate::domain::WizardRequest;
use crate::error::{Error, ExitCode, Result};
use crate::plan::{
    ExecutionPlan, PlanExecutionResult, PlannedStep, Planner, RunContext, Runner,
};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Final outcome of one engine invocation.
#[derive(Debug)]
pub struct WizardExecutionResult {
    pub exit_code: ExitCode,
    pub succeeded: bool,
    pub dry_run: bool,
    pub message: String,
    pub plan: Option<ExecutionPlan>,
    pub run_result: Option<PlanExecutionResult>,
}

impl WizardExecutionResult {
    /// Failed outcome classified from `error`, with its message verbatim.
    #[must_use]
    pub fn from_error(error: &Error, dry_run: bool) -> Self {
        log::debug!("Operation failed ({}): {error}", error.category());
        Self {
            exit_code: ExitCode::from(error),
            succeeded: false,
            dry_run,
            message: error.to_string(),
            plan: None,
            run_result: None,
        }
    }

    /// Serializable form for `--json` output.
    #[must_use]
    pub fn report(&self) -> ExecutionReport<'_> {
        ExecutionReport {
            exit_code: self.exit_code,
            succeeded: self.succeeded,
            dry_run: self.dry_run,
            message: &self.message,
            run_id: self.plan.as_ref().map(|p| p.run_id.to_string()),
            steps: self
                .plan
                .as_ref()
                .map(ExecutionPlan::planned_steps)
                .unwrap_or_default(),
            run_result: self.run_result.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport<'a> {
    pub exit_code: ExitCode,
    pub succeeded: bool,
    pub dry_run: bool,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub steps: Vec<PlannedStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_result: Option<&'a PlanExecutionResult>,
}

/// Ties the manifest source, the state store, the planner and the runner
/// together and maps every failure onto an [`ExitCode`].
pub struct Engine {
    manifests: Arc<dyn ManifestClient>,
    store: Arc<dyn StateStore>,
    planner: Box<dyn Planner>,
    runner: Box<dyn Runner>,
}

impl Engine {
    pub fn new(
        manifests: Arc<dyn ManifestClient>,
        store: Arc<dyn StateStore>,
        planner: Box<dyn Planner>,
        runner: Box<dyn Runner>,
    ) -> Self {
        Self {
            manifests,
            store,
            planner,
            runner,
        }
    }

    /// Build the plan for `request` without running it.
    pub fn plan(
        &self,
        request: &WizardRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionPlan> {
        validate(request)?;

        let state = self.store.load(&request.state_file_path)?;
        cancel.check()?;
        log::debug!(
            "Loaded state with {} component(s) from {}",
            state.components.len(),
            request.state_file_path.display()
        );

        let manifest = self.manifests.get_manifest(&ManifestQuery {
            api_base_uri: request.api_base_uri.clone(),
            channel: request.channel.clone(),
            authentication: request.authentication.clone(),
            tls: request.tls.clone(),
        })?;
        cancel.check()?;
        log::info!(
            "Fetched manifest {} ({} component(s))",
            manifest.manifest_version,
            manifest.components.len()
        );

        self.planner.build(request, &manifest, &state)
    }

    /// Run `request` end to end. Never fails: errors become exit codes.
    pub fn execute(
        &self,
        request: &WizardRequest,
        cancel: &CancellationToken,
    ) -> WizardExecutionResult {
        match self.plan(request, cancel) {
            Ok(plan) => self.run_plan(request, plan, cancel),
            Err(e) => WizardExecutionResult::from_error(&e, request.dry_run),
        }
    }

    /// Run a plan previously returned by [`Engine::plan`] for `request`.
    pub fn run_plan(
        &self,
        request: &WizardRequest,
        plan: ExecutionPlan,
        cancel: &CancellationToken,
    ) -> WizardExecutionResult {
        let dry_run = request.dry_run;
        if plan.is_empty() {
            return WizardExecutionResult {
                exit_code: ExitCode::Success,
                succeeded: true,
                dry_run,
                message: "No changes are required.".to_string(),
                plan: Some(plan),
                run_result: None,
            };
        }

        let outcome = match self
            .runner
            .run(&plan, &RunContext::new(request.clone()), cancel)
        {
            Ok(outcome) => outcome,
            Err(e) => return WizardExecutionResult::from_error(&e, dry_run),
        };

        let exit_code = if outcome.succeeded {
            ExitCode::Success
        } else if outcome.rollback_attempted && outcome.rollback_succeeded {
            ExitCode::ExecutionFailureRollbackSucceeded
        } else {
            ExitCode::ExecutionFailureRollbackFailed
        };

        WizardExecutionResult {
            exit_code,
            succeeded: outcome.succeeded,
            dry_run,
            message: outcome.message.clone(),
            plan: Some(plan),
            run_result: Some(outcome),
        }
    }
}

/// Structural checks done before any I/O.
fn validate(request: &WizardRequest) -> Result<()> {
    if Url::parse(request.api_base_uri.trim()).is_err() {
        return Err(Error::validation("API base URI must be an absolute URI."));
    }
    if is_blank(&request.cache_directory_path) {
        return Err(Error::validation("Cache directory path must be provided."));
    }
    if is_blank(&request.state_file_path) {
        return Err(Error::validation("State file path must be provided."));
    }
    if is_blank(&request.journal_file_path) {
        return Err(Error::validation("Journal file path must be provided."));
    }
    Ok(())
}

fn is_blank(path: &std::path::Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
