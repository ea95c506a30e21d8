//! Host service managers.

mod systemd;
mod windows;

pub use systemd::{DEFAULT_UNIT_DIRECTORY, SystemdServiceManager};
pub use windows::WindowsServiceManager;

use edgeplan::backend::{ProcessRunner, ProcessSpec, ServiceManager};
use edgeplan::{Error, Result};
use std::sync::Arc;

/// Service manager for the running OS: systemd on Linux, the service
/// control manager on Windows.
pub fn default_service_manager(processes: Arc<dyn ProcessRunner>) -> Result<Arc<dyn ServiceManager>> {
    match std::env::consts::OS {
        "linux" => Ok(Arc::new(SystemdServiceManager::new(processes))),
        "windows" => Ok(Arc::new(WindowsServiceManager::new(processes))),
        other => Err(Error::validation(format!(
            "Service management is not supported on '{other}'."
        ))),
    }
}

/// Run a command and fail unless it exits with zero.
fn run_checked<I, S>(processes: &dyn ProcessRunner, program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let spec = ProcessSpec::new(program, args);
    let output = processes.run(&spec)?;
    if !output.succeeded() {
        return Err(Error::Other(format!(
            "{} failed with code {}: {}",
            spec.display(),
            output.exit_code,
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// Quote a value containing spaces.
fn quote(value: &str) -> String {
    if value.contains(' ') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Executable followed by its arguments, each quoted when needed.
fn command_line(executable: &str, arguments: &[String]) -> String {
    std::iter::once(executable)
        .chain(arguments.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}
