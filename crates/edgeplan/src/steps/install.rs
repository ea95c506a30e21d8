//! Install or update one component.

use crate::backend::DownloadContext;
use crate::domain::{
    ArtifactManifest, ComponentManifest, InstalledComponentState, ServiceDefinition, ServiceStatus,
};
use crate::error::{Error, Result};
use crate::plan::{PlanStep, StepContext, StepResult};
use chrono::Utc;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Downloads, verifies and activates a component as a host service.
#[derive(Debug, Clone)]
pub struct InstallOrUpdateStep {
    component: ComponentManifest,
    artifact: ArtifactManifest,
}

impl InstallOrUpdateStep {
    #[must_use]
    pub fn new(component: ComponentManifest, artifact: ArtifactManifest) -> Self {
        Self {
            component,
            artifact,
        }
    }

    #[must_use]
    pub fn component(&self) -> &ComponentManifest {
        &self.component
    }

    #[must_use]
    pub fn artifact(&self) -> &ArtifactManifest {
        &self.artifact
    }

    fn install_path(&self, ctx: &StepContext<'_>) -> PathBuf {
        ctx.request
            .component_install_path(&self.component.id, &self.component.version)
    }

    /// Service definition with blanks filled from the component and the
    /// install location. Relative executables resolve inside the install
    /// directory.
    fn service_definition(&self, installed_path: &Path) -> ServiceDefinition {
        let service = &self.component.service;
        let executable = Path::new(&service.executable_path);
        let executable_path = if executable.is_absolute() {
            executable.to_path_buf()
        } else {
            installed_path.join(executable)
        };

        ServiceDefinition {
            service_name: self.component.service_name().to_string(),
            display_name: non_blank(&service.display_name)
                .unwrap_or(&self.component.display_name)
                .to_string(),
            executable_path: executable_path.to_string_lossy().into_owned(),
            arguments: service.arguments.clone(),
            working_directory_path: non_blank(&service.working_directory_path)
                .map(ToString::to_string)
                .unwrap_or_else(|| installed_path.to_string_lossy().into_owned()),
            environment_variables: service.environment_variables.clone(),
        }
    }
}

fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() { None } else { Some(value) }
}

impl PlanStep for InstallOrUpdateStep {
    fn id(&self) -> String {
        format!("component.apply.{}", self.component.id)
    }

    fn name(&self) -> String {
        format!("Install or update '{}'", self.component.id)
    }

    fn is_reversible(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<StepResult> {
        let id = &self.component.id;
        if ctx.dry_run {
            return Ok(StepResult::success(format!(
                "Dry-run: skipped install/update for {id}."
            )));
        }

        let download = ctx.downloader.download(
            &self.artifact,
            &DownloadContext {
                cache_directory_path: ctx.request.cache_directory_path.clone(),
                authentication: ctx.request.authentication.clone(),
                tls: ctx.request.tls.clone(),
            },
        )?;
        log::debug!(
            "Artifact for {id} at {} (cached: {})",
            download.file_path.display(),
            download.reused_from_cache
        );

        ctx.verifier
            .verify_sha256(&download.file_path, &self.artifact.sha256)?;

        let file_name = self.artifact.local_file_name().ok_or_else(|| {
            Error::integrity(format!(
                "Artifact file name '{}' is invalid.",
                self.artifact.file_name
            ))
        })?;

        let installed_path = self.install_path(ctx);
        fs::create_dir_all(&installed_path).map_err(|e| Error::io(&installed_path, e))?;

        // A running service keeps the old binary; stop it so start picks up
        // the new version.
        let service_name = self.component.service_name();
        if ctx.services.status(service_name)? == ServiceStatus::Running {
            log::info!("Stopping {service_name} before replacing it");
            ctx.services.stop(service_name)?;
        }

        let destination = installed_path.join(file_name);
        fs::copy(&download.file_path, &destination).map_err(|e| Error::io(&destination, e))?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&destination)
                .map_err(|e| Error::io(&destination, e))?
                .permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&destination, perms).map_err(|e| Error::io(&destination, e))?;
        }

        let definition = self.service_definition(&installed_path);
        ctx.services.create_or_update(&definition)?;
        ctx.services.start(&definition.service_name)?;

        ctx.state.upsert_component(InstalledComponentState {
            component_id: id.clone(),
            version: self.component.version.clone(),
            installed_path: installed_path.clone(),
            service_name: definition.service_name,
            installed_at_utc: Utc::now(),
        });

        Ok(StepResult::success(format!(
            "Component '{id}' is installed at '{}'.",
            installed_path.display()
        )))
    }

    fn rollback(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let service_name = self.component.service_name();
        let installed_path = self.install_path(ctx);

        // Each compensation runs even if an earlier one failed.
        if let Err(e) = ctx.services.stop(service_name) {
            log::warn!("Rollback could not stop service {service_name}: {e}");
        }
        if let Err(e) = ctx.services.delete(service_name) {
            log::warn!("Rollback could not delete service {service_name}: {e}");
        }
        if installed_path.exists() {
            if let Err(e) = fs::remove_dir_all(&installed_path) {
                log::warn!(
                    "Rollback could not remove {}: {e}",
                    installed_path.display()
                );
            }
        }

        ctx.state.remove_component(&self.component.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationKind, WizardRequest, WizardState};
    use crate::testing::{Harness, component, linux_artifact};
    use tempfile::TempDir;

    fn step(id: &str, version: &str) -> InstallOrUpdateStep {
        let component = component(id, version);
        let artifact = linux_artifact(id);
        InstallOrUpdateStep::new(component, artifact)
    }

    fn request(temp: &TempDir) -> WizardRequest {
        let mut request = WizardRequest::new(OperationKind::Install, "https://supply.local");
        request.state_file_path = temp.path().join("state.json");
        request.cache_directory_path = temp.path().join("cache");
        request
    }

    #[test]
    fn test_identity() {
        let step = step("collector", "1.0.0");
        assert_eq!(step.id(), "component.apply.collector");
        assert_eq!(step.name(), "Install or update 'collector'");
        assert!(step.is_reversible());
    }

    #[test]
    fn test_execute_installs_and_records_state() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let step = step("collector", "1.0.0");

        let result = harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap();

        let expected_path = temp.path().join("components/collector/1.0.0");
        assert!(result.succeeded);
        assert_eq!(
            result.message,
            format!("Component 'collector' is installed at '{}'.", expected_path.display())
        );
        assert!(expected_path.join("collector.bin").exists());

        let record = state.component("collector").unwrap();
        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.installed_path, expected_path);
        assert_eq!(record.service_name, "collector");

        let calls = harness.services.calls();
        assert_eq!(calls, vec!["create collector", "start collector"]);
        let definition = harness.services.last_definition().unwrap();
        assert_eq!(definition.display_name, "Collector");
        assert_eq!(
            definition.working_directory_path,
            expected_path.to_string_lossy()
        );
        assert_eq!(
            definition.executable_path,
            expected_path.join("bin/collector").to_string_lossy()
        );
        assert_eq!(harness.verifier.verified(), vec!["sha-collector".to_string()]);
    }

    #[test]
    fn test_absolute_executable_is_kept() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let mut component = component("agent", "2.0");
        component.service.executable_path = "/usr/bin/agent".into();
        component.service.service_name = "edge-agent".into();
        let step = InstallOrUpdateStep::new(component, linux_artifact("agent"));

        harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap();

        let definition = harness.services.last_definition().unwrap();
        assert_eq!(definition.executable_path, "/usr/bin/agent");
        assert_eq!(definition.service_name, "edge-agent");
        assert_eq!(state.component("agent").unwrap().service_name, "edge-agent");
    }

    #[test]
    fn test_checksum_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        harness.verifier.reject("collector.bin");
        let mut state = WizardState::default();
        let step = step("collector", "1.0.0");

        let err = harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap_err();

        assert!(matches!(err, Error::ArtifactIntegrity(_)));
        assert!(!state.is_installed("collector"));
        assert!(harness.services.calls().is_empty());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let step = step("collector", "1.0.0");

        let result = harness
            .run_step(&request, &mut state, true, |ctx| step.execute(ctx))
            .unwrap();

        assert_eq!(result.message, "Dry-run: skipped install/update for collector.");
        assert!(state.components.is_empty());
        assert!(harness.services.calls().is_empty());
        assert_eq!(harness.downloader.downloads(), 0);
    }

    #[test]
    fn test_rollback_is_best_effort() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let step = step("collector", "1.0.0");

        harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap();
        harness.services.fail_on("stop");

        harness
            .run_step(&request, &mut state, false, |ctx| {
                step.rollback(ctx).map(|()| StepResult::success(""))
            })
            .unwrap();

        assert!(!state.is_installed("collector"));
        assert!(!temp.path().join("components/collector/1.0.0").exists());
        assert!(harness.services.calls().contains(&"delete collector".to_string()));
    }

    #[test]
    fn test_artifact_stays_inside_install_directory() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let mut artifact = linux_artifact("collector");
        artifact.file_name = "../../escaped.bin".into();
        let step = InstallOrUpdateStep::new(component("collector", "1.0.0"), artifact);

        harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap();

        let install_dir = temp.path().join("components/collector/1.0.0");
        assert!(install_dir.join("escaped.bin").exists());
        assert!(!temp.path().join("components/escaped.bin").exists());
    }

    #[test]
    fn test_artifact_without_file_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        let mut state = WizardState::default();
        let mut artifact = linux_artifact("collector");
        artifact.file_name = "..".into();
        let step = InstallOrUpdateStep::new(component("collector", "1.0.0"), artifact);

        let err = harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap_err();

        assert!(matches!(err, Error::ArtifactIntegrity(_)));
        assert!(!temp.path().join("components/collector").exists());
    }

    #[test]
    fn test_running_service_is_stopped_before_update() {
        let temp = TempDir::new().unwrap();
        let request = request(&temp);
        let harness = Harness::new(&temp);
        harness.services.add_running("collector");
        let mut state = WizardState::default();
        let step = step("collector", "1.1.0");

        harness
            .run_step(&request, &mut state, false, |ctx| step.execute(ctx))
            .unwrap();

        assert_eq!(
            harness.services.calls(),
            vec!["stop collector", "create collector", "start collector"]
        );
    }

}
