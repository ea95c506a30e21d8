//! Windows services through `sc.exe`.

use super::{command_line, run_checked};
use edgeplan::Result;
use edgeplan::backend::{ProcessRunner, ProcessSpec, ServiceManager};
use edgeplan::domain::{ServiceDefinition, ServiceStatus};
use std::sync::Arc;

const SC: &str = "sc.exe";

/// Registers auto-start services with the service control manager.
pub struct WindowsServiceManager {
    processes: Arc<dyn ProcessRunner>,
}

impl WindowsServiceManager {
    pub fn new(processes: Arc<dyn ProcessRunner>) -> Self {
        Self { processes }
    }

    fn sc(&self, args: &[String]) -> Result<()> {
        run_checked(self.processes.as_ref(), SC, args.iter().cloned()).map(drop)
    }

    /// Run `sc.exe` without checking the exit code.
    fn sc_unchecked(&self, verb: &str, service_name: &str) -> Result<()> {
        let output = self
            .processes
            .run(&ProcessSpec::new(SC, [verb, service_name]))?;
        if !output.succeeded() {
            log::debug!("sc.exe {verb} {service_name}: exit {}", output.exit_code);
        }
        Ok(())
    }
}

impl ServiceManager for WindowsServiceManager {
    fn exists(&self, service_name: &str) -> Result<bool> {
        let output = self
            .processes
            .run(&ProcessSpec::new(SC, ["query", service_name]))?;
        Ok(output.succeeded())
    }

    fn create_or_update(&self, definition: &ServiceDefinition) -> Result<()> {
        let name = &definition.service_name;
        let verb = if self.exists(name)? { "config" } else { "create" };
        self.sc(&[
            verb.to_string(),
            name.clone(),
            format!(
                "binPath= {}",
                command_line(&definition.executable_path, &definition.arguments)
            ),
            "start= auto".to_string(),
            format!("DisplayName= {}", definition.display_name),
        ])
    }

    fn start(&self, service_name: &str) -> Result<()> {
        self.sc(&["start".to_string(), service_name.to_string()])
    }

    fn stop(&self, service_name: &str) -> Result<()> {
        if self.exists(service_name)? {
            self.sc_unchecked("stop", service_name)?;
        }
        Ok(())
    }

    fn delete(&self, service_name: &str) -> Result<()> {
        if self.exists(service_name)? {
            self.sc_unchecked("delete", service_name)?;
        }
        Ok(())
    }

    fn status(&self, service_name: &str) -> Result<ServiceStatus> {
        let output = self
            .processes
            .run(&ProcessSpec::new(SC, ["query", service_name]))?;
        if !output.succeeded() {
            return Ok(ServiceStatus::NotFound);
        }
        let stdout = output.stdout.to_ascii_uppercase();
        Ok(if stdout.contains("RUNNING") {
            ServiceStatus::Running
        } else if stdout.contains("STOPPED") {
            ServiceStatus::Stopped
        } else {
            ServiceStatus::Unknown
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scripted::ScriptedRunner;

    fn manager() -> (Arc<ScriptedRunner>, WindowsServiceManager) {
        let runner = Arc::new(ScriptedRunner::default());
        (runner.clone(), WindowsServiceManager::new(runner))
    }

    fn definition() -> ServiceDefinition {
        ServiceDefinition {
            service_name: "gateway".into(),
            display_name: "Edge Gateway".into(),
            executable_path: "C:\\Program Files\\Edge\\gateway.exe".into(),
            arguments: vec!["--port".into(), "8080".into()],
            ..ServiceDefinition::default()
        }
    }

    #[test]
    fn test_create_new_service() {
        let (runner, manager) = manager();
        runner.answer("sc.exe query", 1060, "");

        manager.create_or_update(&definition()).unwrap();

        assert_eq!(
            runner.calls()[1],
            "sc.exe create gateway binPath= \"C:\\Program Files\\Edge\\gateway.exe\" --port 8080 start= auto DisplayName= Edge Gateway"
        );
    }

    #[test]
    fn test_update_existing_service() {
        let (runner, manager) = manager();
        runner.answer("sc.exe query", 0, "STATE : 4 RUNNING");

        manager.create_or_update(&definition()).unwrap();

        assert!(runner.calls()[1].starts_with("sc.exe config gateway binPath= "));
    }

    #[test]
    fn test_stop_and_delete_ignore_missing() {
        let (runner, manager) = manager();
        runner.answer("sc.exe query", 1060, "");

        manager.stop("gateway").unwrap();
        manager.delete("gateway").unwrap();

        assert_eq!(runner.calls(), vec!["sc.exe query gateway", "sc.exe query gateway"]);
    }

    #[test]
    fn test_status_from_query_output() {
        let (runner, manager) = manager();
        runner.answer("sc.exe query up", 0, "        STATE              : 4  RUNNING");
        runner.answer("sc.exe query down", 0, "        STATE              : 1  STOPPED");
        runner.answer("sc.exe query odd", 0, "        STATE              : 2  START_PENDING");
        runner.answer("sc.exe query gone", 1060, "");

        assert_eq!(manager.status("up").unwrap(), ServiceStatus::Running);
        assert_eq!(manager.status("down").unwrap(), ServiceStatus::Stopped);
        assert_eq!(manager.status("odd").unwrap(), ServiceStatus::Unknown);
        assert_eq!(manager.status("gone").unwrap(), ServiceStatus::NotFound);
    }
}
