//! Terminal rendering of plans, run outcomes, host state and the journal.
//!
//! The `*_line` functions build the text so it can be checked without a
//! terminal; the `print_*` functions write it out.

use colored::{ColoredString, Colorize};
use edgeplan::domain::{
    ExternalDependencyState, InstalledComponentState, JournalEntry, JournalEvent, WizardState,
};
use edgeplan::plan::StepExecutionRecord;
use edgeplan::{ExecutionPlan, PlanExecutionResult, PlannedStep, WizardExecutionResult};
use std::path::Path;

/// Operator-facing note that is neither a success nor a failure.
pub fn notice(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Failure written to stderr, used for errors that never reached the engine.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn title(text: &str) {
    println!();
    println!("{}", text.bold());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
}

fn section(text: &str) {
    println!();
    println!("{}", text.cyan().bold());
}

fn outcome_mark(succeeded: bool) -> ColoredString {
    if succeeded { "✓".green() } else { "✗".red() }
}

// ============================================================================
// Plans
// ============================================================================

/// `[2/3] Install or update 'collector'`, flagged when it cannot be undone.
pub fn plan_step_line(position: usize, total: usize, step: &PlannedStep) -> String {
    let counter = format!("[{position}/{total}]").blue().bold();
    if step.reversible {
        format!("{counter} {}", step.name)
    } else {
        format!("{counter} {} {}", step.name, "(irreversible)".dimmed())
    }
}

/// Steps of `plan` followed by the components it leaves installed.
pub fn print_plan(plan: &ExecutionPlan) {
    let run_id = plan.run_id.to_string();
    title(&format!("Plan {} ({})", short_id(&run_id), plan.operation));

    let steps = plan.planned_steps();
    if steps.is_empty() {
        println!("  {}", "No changes are required.".dimmed());
        return;
    }
    for (i, step) in steps.iter().enumerate() {
        println!("{}", plan_step_line(i + 1, steps.len(), step));
    }

    section("Resulting components");
    if plan.target_state.components.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for (id, component) in &plan.target_state.components {
        println!("  {}: {}", id.dimmed(), component.version);
    }
}

// ============================================================================
// Run outcome
// ============================================================================

/// `  ✓ Install or update 'collector'`, with the step message when it
/// failed or when `detail` is set.
pub fn step_outcome_line(record: &StepExecutionRecord, detail: bool) -> String {
    let mut line = format!("  {} {}", outcome_mark(record.succeeded), record.step_name);
    if detail || !record.succeeded {
        line.push_str(&format!("\n    {}", record.message.dimmed()));
    }
    line
}

/// What happened to completed steps after a failure, if anything.
pub fn rollback_line(run: &PlanExecutionResult) -> Option<String> {
    if !run.rollback_attempted {
        return None;
    }
    let line = if run.rollback_succeeded {
        "Completed steps were rolled back."
    } else {
        "Rollback did not complete; host may be partially changed."
    };
    Some(format!("{} {line}", "⚠".yellow()))
}

/// Final line of a run: the message, tagged with the exit code on failure.
pub fn summary_line(result: &WizardExecutionResult) -> String {
    let suffix = if result.dry_run { " (dry run)" } else { "" };
    if result.succeeded {
        format!("{} {}{suffix}", outcome_mark(true), result.message)
    } else {
        format!(
            "{} {}{suffix} [exit {}]",
            outcome_mark(false),
            result.message,
            result.exit_code
        )
    }
}

/// Per-step outcomes (unless `quiet`), rollback note and the summary.
pub fn print_outcome(result: &WizardExecutionResult, quiet: bool, detail: bool) {
    if let Some(run) = &result.run_result {
        if !quiet {
            for record in &run.step_results {
                println!("{}", step_outcome_line(record, detail));
            }
        }
        if let Some(line) = rollback_line(run) {
            println!("{line}");
        }
    }

    let line = summary_line(result);
    if result.succeeded {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }
}

// ============================================================================
// Host state
// ============================================================================

/// `  collector 1.4.2 /opt/edge/components/collector/1.4.2`
pub fn component_line(component: &InstalledComponentState, detail: bool) -> String {
    let mut line = format!(
        "  {} {} {}",
        component.component_id.bold(),
        component.version.green(),
        component.installed_path.display().to_string().dimmed()
    );
    if detail && !component.service_name.is_empty() {
        line.push_str(&format!(
            "\n    {}",
            format!("service: {}", component.service_name).dimmed()
        ));
    }
    line
}

/// `  redis: redis://cache.local:6379 (validated 2026-10-19 08:30)`
pub fn dependency_line(dependency: &ExternalDependencyState) -> String {
    format!(
        "  {}: {} (validated {})",
        dependency.dependency_id.dimmed(),
        dependency.endpoint,
        dependency.validated_at_utc.format("%Y-%m-%d %H:%M")
    )
}

pub fn print_state(path: &Path, state: &WizardState, detail: bool) {
    title("Host state");
    println!("  {}: {}", "File".dimmed(), path.display());
    println!("  {}: {}", "Schema".dimmed(), state.schema_version);
    println!(
        "  {}: {}",
        "Manifest".dimmed(),
        state.last_manifest_version.as_deref().unwrap_or("-")
    );
    println!(
        "  {}: {}",
        "Updated".dimmed(),
        state.updated_at_utc.format("%Y-%m-%d %H:%M:%S UTC")
    );

    section(&format!("Components ({})", state.components.len()));
    if state.components.is_empty() {
        println!("  {}", "No components installed.".dimmed());
    }
    for component in state.components.values() {
        println!("{}", component_line(component, detail));
    }

    if !state.external_dependencies.is_empty() {
        section("External dependencies");
        for dependency in state.external_dependencies.values() {
            println!("{}", dependency_line(dependency));
        }
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Journal event name colored by outcome.
fn event_label(event: JournalEvent) -> ColoredString {
    let name = event.as_str();
    match event {
        JournalEvent::StepFailed | JournalEvent::RollbackFailed | JournalEvent::RunFailed => {
            name.red()
        }
        JournalEvent::RollbackSucceeded => name.yellow(),
        JournalEvent::RunCompleted | JournalEvent::StepSucceeded => name.green(),
        JournalEvent::RunStarted => name.blue(),
    }
}

/// `2026-10-19 08:30:12 8c1f2a7e step_failed [install:collector] message`
pub fn journal_line(entry: &JournalEntry) -> String {
    let run = entry.run_id.to_string();
    let step = entry
        .step_id
        .as_deref()
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    format!(
        "{} {} {}{} {}",
        entry.timestamp_utc.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        short_id(&run).cyan(),
        event_label(entry.event_type),
        step.dimmed(),
        entry.message
    )
}

// ============================================================================
// Formatting
// ============================================================================

/// "1 component", "3 components"
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// First block of a run id, enough to tell runs apart in a listing.
pub fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}
