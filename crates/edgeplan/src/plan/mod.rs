//! Execution plans: building, ordering and running them.

mod builder;
pub mod cloner;
mod runner;
pub mod sorter;
mod step;

pub use builder::PlanBuilder;
pub use runner::PlanRunner;
pub use step::{BoxedStep, PlanStep, StepContext, StepExecutionRecord, StepResult};

use crate::cancel::CancellationToken;
use crate::domain::{ManifestDocument, OperationKind, WizardRequest, WizardState};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered steps computed once per run. Immutable after building.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub run_id: Uuid,
    pub operation: OperationKind,
    pub request: WizardRequest,
    pub manifest: ManifestDocument,
    /// Deep copy of the state the plan was computed from.
    pub initial_state: WizardState,
    /// Projected state after every step succeeds.
    pub target_state: WizardState,
    pub steps: Vec<BoxedStep>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step ids in execution order.
    #[must_use]
    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Serializable view of the steps, for printing.
    #[must_use]
    pub fn planned_steps(&self) -> Vec<PlannedStep> {
        self.steps
            .iter()
            .map(|s| PlannedStep {
                id: s.id(),
                name: s.name(),
                reversible: s.is_reversible(),
            })
            .collect()
    }
}

/// One step of a plan as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
    pub id: String,
    pub name: String,
    pub reversible: bool,
}

/// Per-run options handed to the runner.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub request: WizardRequest,
    pub dry_run: bool,
}

impl RunContext {
    #[must_use]
    pub fn new(request: WizardRequest) -> Self {
        let dry_run = request.dry_run;
        Self { request, dry_run }
    }
}

/// Structured outcome of running a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExecutionResult {
    pub succeeded: bool,
    pub rollback_attempted: bool,
    pub rollback_succeeded: bool,
    /// Working state at the end of the run, rolled back on failure.
    pub final_state: WizardState,
    pub step_results: Vec<StepExecutionRecord>,
    pub message: String,
}

/// Turns a request into a plan.
pub trait Planner: Send + Sync {
    fn build(
        &self,
        request: &WizardRequest,
        manifest: &ManifestDocument,
        state: &WizardState,
    ) -> Result<ExecutionPlan>;
}

/// Executes a plan.
///
/// Step failures are reported through [`PlanExecutionResult`]. The only
/// error returned is cancellation, or a journal write failing during
/// rollback.
pub trait Runner: Send + Sync {
    fn run(
        &self,
        plan: &ExecutionPlan,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<PlanExecutionResult>;
}
