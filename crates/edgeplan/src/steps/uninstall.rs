//! Remove one component.

use crate::error::{Error, Result};
use crate::plan::{PlanStep, StepContext, StepResult};
use std::fs;

/// Stops and removes a component's service, optionally purging its files.
///
/// Irreversible: once data is purged there is nothing to restore.
#[derive(Debug, Clone)]
pub struct UninstallStep {
    component_id: String,
    purge_data: bool,
}

impl UninstallStep {
    pub fn new(component_id: impl Into<String>, purge_data: bool) -> Self {
        Self {
            component_id: component_id.into(),
            purge_data,
        }
    }
}

impl PlanStep for UninstallStep {
    fn id(&self) -> String {
        format!("component.remove.{}", self.component_id)
    }

    fn name(&self) -> String {
        format!("Uninstall '{}'", self.component_id)
    }

    fn is_reversible(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<StepResult> {
        let id = &self.component_id;
        if ctx.dry_run {
            return Ok(StepResult::success(format!(
                "Dry-run: skipped uninstall for {id}."
            )));
        }

        let Some(record) = ctx.state.component(id).cloned() else {
            return Ok(StepResult::success(format!(
                "Component '{id}' is not installed."
            )));
        };

        let service_name = record.service_name.trim();
        if !service_name.is_empty() && ctx.services.exists(service_name)? {
            ctx.services.stop(service_name)?;
            ctx.services.delete(service_name)?;
        }

        let path = &record.installed_path;
        if self.purge_data && !path.as_os_str().is_empty() && path.exists() {
            fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
            log::debug!("Purged {}", path.display());
        }

        ctx.state.remove_component(id);
        Ok(StepResult::success(format!("Component '{id}' was removed.")))
    }

    fn rollback(&self, _ctx: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }
}
