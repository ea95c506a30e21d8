//! Child process execution.

use edgeplan::backend::{ProcessOutput, ProcessRunner, ProcessSpec};
use edgeplan::{Error, Result};
use std::process::{Command, Stdio};

/// Runs processes with `std::process::Command`, capturing output.
///
/// A non-zero exit is not an error here; callers inspect
/// [`ProcessOutput::succeeded`]. Only failing to spawn is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProcessRunner;

impl ProcessRunner for CommandProcessRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput> {
        log::debug!("Running: {}", spec.display());

        let mut command = Command::new(&spec.file_name);
        command
            .args(&spec.arguments)
            .envs(&spec.environment)
            .stdin(Stdio::null());
        if let Some(dir) = &spec.working_directory {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|e| Error::io(&spec.file_name, e))?;

        Ok(ProcessOutput {
            // Killed by a signal: no code.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
