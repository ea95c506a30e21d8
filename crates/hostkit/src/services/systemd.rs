//! systemd units driven through `systemctl`.

use super::{command_line, run_checked};
use edgeplan::backend::{ProcessRunner, ProcessSpec, ServiceManager};
use edgeplan::domain::{ServiceDefinition, ServiceStatus};
use edgeplan::{Error, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_UNIT_DIRECTORY: &str = "/etc/systemd/system";

const SYSTEMCTL: &str = "systemctl";

/// Writes `<name>.service` unit files and manages them with `systemctl`.
pub struct SystemdServiceManager {
    processes: Arc<dyn ProcessRunner>,
    unit_directory: PathBuf,
}

impl SystemdServiceManager {
    pub fn new(processes: Arc<dyn ProcessRunner>) -> Self {
        Self::with_unit_directory(processes, DEFAULT_UNIT_DIRECTORY)
    }

    /// Use `unit_directory` instead of `/etc/systemd/system`. A blank path
    /// falls back to the default.
    pub fn with_unit_directory(
        processes: Arc<dyn ProcessRunner>,
        unit_directory: impl Into<PathBuf>,
    ) -> Self {
        let unit_directory = unit_directory.into();
        let unit_directory = if unit_directory.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_UNIT_DIRECTORY)
        } else {
            unit_directory
        };
        Self {
            processes,
            unit_directory,
        }
    }

    #[must_use]
    pub fn unit_path(&self, service_name: &str) -> PathBuf {
        self.unit_directory.join(format!("{service_name}.service"))
    }

    fn systemctl<const N: usize>(&self, args: [&str; N]) -> Result<String> {
        run_checked(self.processes.as_ref(), SYSTEMCTL, args)
    }
}

/// Render the unit file for `definition`.
#[must_use]
pub fn unit_file(definition: &ServiceDefinition) -> String {
    let exec_start = command_line(&definition.executable_path, &definition.arguments);
    let working_directory = if definition.working_directory_path.trim().is_empty() {
        Path::new(&definition.executable_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| "/".to_string(), |p| p.display().to_string())
    } else {
        definition.working_directory_path.clone()
    };

    let mut unit = String::new();
    let _ = writeln!(unit, "[Unit]");
    let _ = writeln!(unit, "Description={}", definition.display_name);
    let _ = writeln!(unit, "After=network.target");
    let _ = writeln!(unit);
    let _ = writeln!(unit, "[Service]");
    let _ = writeln!(unit, "Type=simple");
    let _ = writeln!(unit, "WorkingDirectory={working_directory}");
    let _ = writeln!(unit, "ExecStart={exec_start}");
    let _ = writeln!(unit, "Restart=always");
    // BTreeMap iteration keeps Environment= lines sorted by key.
    for (key, value) in &definition.environment_variables {
        let _ = writeln!(unit, "Environment=\"{key}={}\"", value.replace('"', "\\\""));
    }
    let _ = writeln!(unit);
    let _ = writeln!(unit, "[Install]");
    let _ = writeln!(unit, "WantedBy=multi-user.target");
    unit
}

impl ServiceManager for SystemdServiceManager {
    fn exists(&self, service_name: &str) -> Result<bool> {
        let output = self.processes.run(&ProcessSpec::new(
            SYSTEMCTL,
            ["show", service_name, "--property=LoadState", "--value"],
        ))?;
        Ok(output.succeeded() && !output.stdout.trim().eq_ignore_ascii_case("not-found"))
    }

    fn create_or_update(&self, definition: &ServiceDefinition) -> Result<()> {
        let name = definition.service_name.as_str();
        let path = self.unit_path(name);
        fs::create_dir_all(&self.unit_directory)
            .map_err(|e| Error::io(&self.unit_directory, e))?;
        fs::write(&path, unit_file(definition)).map_err(|e| Error::io(&path, e))?;
        log::debug!("Wrote unit file {}", path.display());

        self.systemctl(["daemon-reload"])?;
        self.systemctl(["enable", name])?;
        Ok(())
    }

    fn start(&self, service_name: &str) -> Result<()> {
        self.systemctl(["start", service_name]).map(drop)
    }

    fn stop(&self, service_name: &str) -> Result<()> {
        if !self.exists(service_name)? {
            return Ok(());
        }
        self.systemctl(["stop", service_name]).map(drop)
    }

    fn delete(&self, service_name: &str) -> Result<()> {
        if !self.exists(service_name)? {
            return Ok(());
        }

        // Disabling an already disabled unit fails; that is fine here.
        let disable = self
            .processes
            .run(&ProcessSpec::new(SYSTEMCTL, ["disable", service_name]))?;
        if !disable.succeeded() {
            log::debug!("systemctl disable {service_name}: {}", disable.stderr.trim());
        }

        let path = self.unit_path(service_name);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
        self.systemctl(["daemon-reload"]).map(drop)
    }

    fn status(&self, service_name: &str) -> Result<ServiceStatus> {
        let output = self
            .processes
            .run(&ProcessSpec::new(SYSTEMCTL, ["is-active", service_name]))?;
        if !output.succeeded() {
            return Ok(if self.exists(service_name)? {
                ServiceStatus::Stopped
            } else {
                ServiceStatus::NotFound
            });
        }
        Ok(if output.stdout.trim().eq_ignore_ascii_case("active") {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        })
    }
}
