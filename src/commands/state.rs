//! `state`: show what is applied on this host.

use crate::Context;
use crate::commands::{Defaults, load_config};
use crate::config;
use crate::ui;
use anyhow::Result;
use edgeplan::ExitCode;
use edgeplan::backend::StateStore;
use hostkit::JsonStateStore;
use std::path::PathBuf;

pub fn run(ctx: &Context, state_file: Option<PathBuf>) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let path = match state_file.or_else(|| config::expand_opt(config.state_file.as_deref())) {
        Some(path) => path,
        None => Defaults::resolve()?.state_file,
    };

    let state = JsonStateStore::new().load(&path)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(ExitCode::Success);
    }

    ui::print_state(&path, &state, ctx.verbose > 0);
    Ok(ExitCode::Success)
}
