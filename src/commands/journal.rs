//! `journal`: print the audit trail.

use crate::Context;
use crate::commands::{Defaults, load_config};
use crate::config;
use crate::ui;
use anyhow::Result;
use edgeplan::ExitCode;
use edgeplan::domain::JournalEntry;
use hostkit::JsonStateStore;
use std::path::PathBuf;
use uuid::Uuid;

pub fn run(
    ctx: &Context,
    run_id: Option<Uuid>,
    limit: Option<usize>,
    journal_file: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let path = match journal_file.or_else(|| config::expand_opt(config.journal_file.as_deref()))
    {
        Some(path) => path,
        None => Defaults::resolve()?.journal_file,
    };

    let entries = select(JsonStateStore::new().read_journal(&path)?, run_id, limit);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::Success);
    }

    if entries.is_empty() {
        ui::notice(&format!("No journal entries in {}", path.display()));
        return Ok(ExitCode::Success);
    }

    for entry in &entries {
        println!("{}", ui::journal_line(entry));
    }
    Ok(ExitCode::Success)
}

/// Keep entries of `run_id` (all runs when `None`), then the last `limit`.
fn select(
    entries: Vec<JournalEntry>,
    run_id: Option<Uuid>,
    limit: Option<usize>,
) -> Vec<JournalEntry> {
    let mut entries: Vec<_> = entries
        .into_iter()
        .filter(|e| run_id.is_none_or(|id| e.run_id == id))
        .collect();
    if let Some(limit) = limit
        && entries.len() > limit
    {
        entries.drain(..entries.len() - limit);
    }
    entries
}
