//! Plan step contract.
//!
//! A step is one reversible-or-not unit of work in a plan. The runner owns
//! a single mutable [`WizardState`] for the lifetime of a run and hands it
//! to every `execute` and `rollback` call through [`StepContext`].

use crate::backend::{ArtifactDownloader, ChecksumVerifier, ServiceManager};
use crate::domain::{ManifestDocument, WizardRequest, WizardState};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Core trait for plan steps
///
/// Implementations provide:
/// - Identity (stable id and display name)
/// - Reversibility
/// - Execution against the run's working state
/// - Compensation after a later step fails
///
/// Irreversible steps still implement `rollback`, as a no-op.
pub trait PlanStep: Send + Sync + fmt::Debug {
    /// Stable identifier, e.g. `component.apply.collector`.
    fn id(&self) -> String;

    /// Human-readable name used in journal messages.
    fn name(&self) -> String;

    /// Whether `rollback` undoes `execute`.
    fn is_reversible(&self) -> bool;

    /// Perform the step.
    ///
    /// Returns a failed [`StepResult`] for an expected failure, or an error
    /// for anything raised along the way. The runner treats both as the
    /// failure that triggers rollback.
    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<StepResult>;

    /// Undo a successful `execute`.
    fn rollback(&self, ctx: &mut StepContext<'_>) -> Result<()>;
}

/// A boxed step for type-erased storage
pub type BoxedStep = Box<dyn PlanStep>;

/// Everything a step can touch during a run.
pub struct StepContext<'a> {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub request: &'a WizardRequest,
    pub manifest: &'a ManifestDocument,
    pub downloader: &'a dyn ArtifactDownloader,
    pub verifier: &'a dyn ChecksumVerifier,
    pub services: &'a dyn ServiceManager,
    /// The run's working state.
    pub state: &'a mut WizardState,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("run_id", &self.run_id)
            .field("dry_run", &self.dry_run)
            .field("operation", &self.request.operation)
            .field("manifest_version", &self.manifest.manifest_version)
            .finish_non_exhaustive()
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub succeeded: bool,
    pub message: String,
}

impl StepResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Per-step record kept in the run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionRecord {
    pub step_id: String,
    pub step_name: String,
    pub succeeded: bool,
    pub message: String,
}
