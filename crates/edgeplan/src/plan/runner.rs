//! Plan execution with journaling and rollback.
//!
//! Steps run strictly one after another. Every transition is journaled as
//! it happens. On the first failure every reversible step that already
//! completed is rolled back in reverse order, each independently of the
//! others. State is persisted only when the whole plan succeeds outside a
//! dry run.

use super::cloner::clone_state;
use super::{
    ExecutionPlan, PlanExecutionResult, PlanStep, RunContext, Runner, StepContext,
    StepExecutionRecord, StepResult,
};
use crate::backend::{ArtifactDownloader, ChecksumVerifier, ServiceManager, StateStore};
use crate::cancel::CancellationToken;
use crate::domain::{JournalEntry, JournalEvent, WizardState};
use crate::error::{Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// Default [`Runner`] wired to the host collaborators.
pub struct PlanRunner {
    downloader: Arc<dyn ArtifactDownloader>,
    verifier: Arc<dyn ChecksumVerifier>,
    store: Arc<dyn StateStore>,
    services: Arc<dyn ServiceManager>,
}

/// How the forward pass ended, short of an error.
enum Flow {
    Completed,
    StepFailed(String),
}

/// Mutable bookkeeping for one run.
struct Run<'p> {
    plan: &'p ExecutionPlan,
    working: WizardState,
    records: Vec<StepExecutionRecord>,
    executed: Vec<&'p dyn PlanStep>,
}

impl PlanRunner {
    pub fn new(
        downloader: Arc<dyn ArtifactDownloader>,
        verifier: Arc<dyn ChecksumVerifier>,
        store: Arc<dyn StateStore>,
        services: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            downloader,
            verifier,
            store,
            services,
        }
    }

    fn journal(&self, context: &RunContext, entry: &JournalEntry) -> Result<()> {
        self.store
            .append_journal(&context.request.journal_file_path, entry)
    }

    fn step_context<'a>(
        &'a self,
        run: &'a mut Run<'_>,
        context: &'a RunContext,
    ) -> StepContext<'a> {
        StepContext {
            run_id: run.plan.run_id,
            dry_run: context.dry_run,
            request: &context.request,
            manifest: &run.plan.manifest,
            downloader: self.downloader.as_ref(),
            verifier: self.verifier.as_ref(),
            services: self.services.as_ref(),
            state: &mut run.working,
        }
    }

    /// Execute one step. Dry runs get a synthetic success instead.
    fn execute_step(
        &self,
        run: &mut Run<'_>,
        context: &RunContext,
        step: &dyn PlanStep,
    ) -> Result<StepResult> {
        if context.dry_run {
            return Ok(StepResult::success(format!("Dry-run: {}", step.name())));
        }
        let mut ctx = self.step_context(run, context);
        step.execute(&mut ctx)
    }

    /// The forward pass. Any error returned here other than cancellation
    /// becomes "Execution failed" and triggers rollback.
    fn forward<'p>(
        &self,
        run: &mut Run<'p>,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<Flow> {
        let plan = run.plan;
        for step in &plan.steps {
            cancel.check()?;
            let step: &'p dyn PlanStep = step.as_ref();
            log::info!("Running {}", step.id());

            let result = self.execute_step(run, context, step)?;
            run.records.push(StepExecutionRecord {
                step_id: step.id(),
                step_name: step.name(),
                succeeded: result.succeeded,
                message: result.message.clone(),
            });

            let event = if result.succeeded {
                JournalEvent::StepSucceeded
            } else {
                JournalEvent::StepFailed
            };
            self.journal(
                context,
                &JournalEntry::new(plan.run_id, event, result.message.clone()).for_step(step.id()),
            )?;

            if !result.succeeded {
                return Ok(Flow::StepFailed(format!(
                    "Step '{}' failed: {}",
                    step.name(),
                    result.message
                )));
            }
            if step.is_reversible() && !context.dry_run {
                run.executed.push(step);
            }
        }

        if !context.dry_run {
            run.working.updated_at_utc = Utc::now();
            self.store
                .save(&context.request.state_file_path, &run.working)?;
        }

        self.journal(
            context,
            &JournalEntry::new(
                plan.run_id,
                JournalEvent::RunCompleted,
                "Operation completed successfully.",
            ),
        )?;
        Ok(Flow::Completed)
    }

    /// Compensate completed reversible steps, newest first.
    fn rollback(
        &self,
        mut run: Run<'_>,
        context: &RunContext,
        failure: String,
    ) -> Result<PlanExecutionResult> {
        let run_id = run.plan.run_id;
        let attempted = !run.executed.is_empty() && !context.dry_run;
        let mut succeeded = true;

        if attempted {
            let executed = std::mem::take(&mut run.executed);
            for step in executed.into_iter().rev() {
                let outcome = {
                    let mut ctx = self.step_context(&mut run, context);
                    step.rollback(&mut ctx)
                };
                let entry = match outcome {
                    Ok(()) => JournalEntry::new(
                        run_id,
                        JournalEvent::RollbackSucceeded,
                        format!("Rollback succeeded for '{}'.", step.name()),
                    ),
                    Err(e) => {
                        succeeded = false;
                        log::warn!("Rollback of {} failed: {e}", step.id());
                        JournalEntry::new(
                            run_id,
                            JournalEvent::RollbackFailed,
                            format!("Rollback failed for '{}': {e}", step.name()),
                        )
                    }
                };
                self.journal(context, &entry.for_step(step.id()))?;
            }
        }

        self.journal(
            context,
            &JournalEntry::new(run_id, JournalEvent::RunFailed, failure.clone()),
        )?;

        Ok(PlanExecutionResult {
            succeeded: false,
            rollback_attempted: attempted,
            rollback_succeeded: succeeded,
            final_state: clone_state(&run.working),
            step_results: run.records,
            message: failure,
        })
    }
}

impl Runner for PlanRunner {
    fn run(
        &self,
        plan: &ExecutionPlan,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<PlanExecutionResult> {
        let mut run = Run {
            plan,
            working: clone_state(&plan.initial_state),
            records: Vec::new(),
            executed: Vec::new(),
        };

        self.journal(
            context,
            &JournalEntry::new(
                plan.run_id,
                JournalEvent::RunStarted,
                format!("Operation '{}' started.", plan.operation),
            ),
        )?;

        match self.forward(&mut run, context, cancel) {
            Ok(Flow::Completed) => Ok(PlanExecutionResult {
                succeeded: true,
                rollback_attempted: false,
                rollback_succeeded: true,
                final_state: run.working,
                step_results: run.records,
                message: if context.dry_run {
                    "Dry-run completed successfully.".to_string()
                } else {
                    "Operation completed successfully.".to_string()
                },
            }),
            Ok(Flow::StepFailed(message)) => self.rollback(run, context, message),
            Err(Error::Cancelled) => {
                log::warn!(
                    "Run {} cancelled after {} step(s); no rollback performed",
                    plan.run_id,
                    run.records.len()
                );
                Err(Error::Cancelled)
            }
            Err(e) => self.rollback(run, context, format!("Execution failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationKind, WizardRequest};
    use crate::plan::BoxedStep;
    use crate::testing::{FakeStep, Harness, StepLog, empty_plan};
    use tempfile::TempDir;

    fn request(temp: &TempDir, dry_run: bool) -> WizardRequest {
        let mut request = WizardRequest::new(OperationKind::Install, "https://supply.local");
        request.state_file_path = temp.path().join("state.json");
        request.journal_file_path = temp.path().join("journal.jsonl");
        request.cache_directory_path = temp.path().join("cache");
        request.dry_run = dry_run;
        request
    }

    fn plan_with(request: &WizardRequest, steps: Vec<BoxedStep>) -> ExecutionPlan {
        let mut plan = empty_plan(request);
        plan.steps = steps;
        plan
    }

    #[test]
    fn test_success_persists_and_journals() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(
            &request,
            vec![
                FakeStep::ok("one", &log).boxed(),
                FakeStep::ok("two", &log).boxed(),
            ],
        );

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(result.succeeded);
        assert!(!result.rollback_attempted);
        assert_eq!(result.message, "Operation completed successfully.");
        assert_eq!(log.entries(), vec!["execute one", "execute two"]);
        assert_eq!(harness.store.saves(), 1);
        assert!(result.final_state.is_installed("one"));
        assert_eq!(
            harness.store.events(),
            vec![
                JournalEvent::RunStarted,
                JournalEvent::StepSucceeded,
                JournalEvent::StepSucceeded,
                JournalEvent::RunCompleted,
            ]
        );
        assert_eq!(result.step_results.len(), 2);
        assert_eq!(result.step_results[0].step_id, "fake.one");
    }

    #[test]
    fn test_dry_run_executes_nothing_and_saves_nothing() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, true);
        let plan = plan_with(&request, vec![FakeStep::ok("one", &log).boxed()]);

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(result.succeeded);
        assert_eq!(result.message, "Dry-run completed successfully.");
        assert_eq!(result.step_results[0].message, "Dry-run: Fake 'one'");
        assert!(log.entries().is_empty());
        assert_eq!(harness.store.saves(), 0);
        assert_eq!(
            harness.store.events().last(),
            Some(&JournalEvent::RunCompleted)
        );
    }

    #[test]
    fn test_failure_rolls_back_reversible_steps_in_reverse() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(
            &request,
            vec![
                FakeStep::ok("first", &log).boxed(),
                FakeStep::ok("second", &log).irreversible().boxed(),
                FakeStep::ok("third", &log).boxed(),
                FakeStep::failing("fourth", &log).boxed(),
                FakeStep::ok("never", &log).boxed(),
            ],
        );

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(!result.succeeded);
        assert!(result.rollback_attempted);
        assert!(result.rollback_succeeded);
        assert_eq!(result.message, "Step 'Fake 'fourth'' failed: fourth broke");
        assert_eq!(
            log.entries(),
            vec![
                "execute first",
                "execute second",
                "execute third",
                "execute fourth",
                "rollback third",
                "rollback first",
            ]
        );
        assert!(!result.final_state.is_installed("first"));
        assert!(result.final_state.is_installed("second"));
        assert_eq!(harness.store.saves(), 0);
        assert_eq!(
            harness.store.events(),
            vec![
                JournalEvent::RunStarted,
                JournalEvent::StepSucceeded,
                JournalEvent::StepSucceeded,
                JournalEvent::StepSucceeded,
                JournalEvent::StepFailed,
                JournalEvent::RollbackSucceeded,
                JournalEvent::RollbackSucceeded,
                JournalEvent::RunFailed,
            ]
        );
    }

    #[test]
    fn test_raised_error_is_execution_failure() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(
            &request,
            vec![
                FakeStep::ok("first", &log).boxed(),
                FakeStep::raising("second", &log).boxed(),
            ],
        );

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(!result.succeeded);
        assert_eq!(result.message, "Execution failed: second exploded");
        assert_eq!(log.count("rollback first"), 1);
        // A raised error records no outcome for the step.
        assert_eq!(result.step_results.len(), 1);
    }

    #[test]
    fn test_rollback_failure_does_not_stop_earlier_rollbacks() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(
            &request,
            vec![
                FakeStep::ok("first", &log).boxed(),
                FakeStep::ok("second", &log).rollback_fails().boxed(),
                FakeStep::failing("third", &log).boxed(),
            ],
        );

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(result.rollback_attempted);
        assert!(!result.rollback_succeeded);
        assert_eq!(log.count("rollback first"), 1);
        assert_eq!(log.count("rollback second"), 1);

        let journal = harness.store.journal();
        let failed = journal
            .iter()
            .find(|e| e.event_type == JournalEvent::RollbackFailed)
            .unwrap();
        assert_eq!(failed.step_id.as_deref(), Some("fake.second"));
        assert_eq!(
            failed.message,
            "Rollback failed for 'Fake 'second'': second cannot be undone"
        );
        assert_eq!(
            journal.last().unwrap().message,
            "Step 'Fake 'third'' failed: third broke"
        );
    }

    #[test]
    fn test_first_step_failure_attempts_no_rollback() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(&request, vec![FakeStep::failing("only", &log).boxed()]);

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(!result.rollback_attempted);
        assert!(result.rollback_succeeded);
    }

    #[test]
    fn test_cancellation_skips_rollback_and_persistence() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let cancel = CancellationToken::new();
        let request = request(&temp, false);
        let plan = plan_with(
            &request,
            vec![
                FakeStep::ok("first", &log).cancels(&cancel).boxed(),
                FakeStep::ok("second", &log).boxed(),
            ],
        );

        let err = harness
            .runner()
            .run(&plan, &RunContext::new(request), &cancel)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(log.entries(), vec!["execute first"]);
        assert_eq!(harness.store.saves(), 0);
        assert!(
            !harness
                .store
                .events()
                .iter()
                .any(|e| matches!(e, JournalEvent::RunFailed | JournalEvent::RollbackSucceeded))
        );
    }

    #[test]
    fn test_save_failure_rolls_back() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        harness.store.fail_saves();
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(&request, vec![FakeStep::ok("first", &log).boxed()]);

        let result = harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(!result.succeeded);
        assert!(result.message.starts_with("Execution failed: "));
        assert_eq!(log.count("rollback first"), 1);
    }

    #[test]
    fn test_plan_initial_state_is_not_mutated() {
        let temp = TempDir::new().unwrap();
        let harness = Harness::new(&temp);
        let log = StepLog::default();
        let request = request(&temp, false);
        let plan = plan_with(&request, vec![FakeStep::ok("first", &log).boxed()]);

        harness
            .runner()
            .run(&plan, &RunContext::new(request), &CancellationToken::new())
            .unwrap();

        assert!(!plan.initial_state.is_installed("first"));
    }
}
