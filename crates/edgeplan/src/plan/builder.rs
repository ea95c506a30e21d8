//! Plan construction.
//!
//! Building is pure: given a request, a manifest, the current state and the
//! target platform it returns the same plan every time (apart from the run
//! id and timestamps). The steps are:
//!
//! 1. select target components
//! 2. close the selection over managed dependencies, collecting external ones
//! 3. build the dependency graph and order it
//! 4. emit validation and component steps
//! 5. project the target state

use super::cloner::clone_state;
use super::sorter::DependencyGraph;
use super::{BoxedStep, ExecutionPlan, Planner};
use crate::domain::{
    ArtifactManifest, ComponentManifest, DependencyPolicy, InstalledComponentState,
    ManifestDocument, OperationKind, Platform, WizardRequest, WizardState,
};
use crate::error::{Error, Result};
use crate::ids::IdSet;
use crate::steps::{InstallOrUpdateStep, UninstallStep, ValidateDependencyStep};
use chrono::Utc;
use std::collections::VecDeque;
use uuid::Uuid;

/// Builds execution plans for one target platform.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    platform: Platform,
}

impl PlanBuilder {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Pick the artifact matching the builder's platform.
    fn select_artifact<'m>(
        &self,
        manifest: &ManifestDocument,
        component: &'m ComponentManifest,
    ) -> Result<&'m ArtifactManifest> {
        component
            .artifact_for(&self.platform.os, &self.platform.architecture)
            .ok_or_else(|| {
                Error::validation(format!(
                    "No artifact found for component '{}' on '{}' in manifest '{}'.",
                    component.id, self.platform, manifest.manifest_version
                ))
            })
    }

    fn component_steps(
        &self,
        request: &WizardRequest,
        manifest: &ManifestDocument,
        state: &WizardState,
        ordered: &[String],
    ) -> Result<Vec<BoxedStep>> {
        let mut steps: Vec<BoxedStep> = Vec::new();
        for id in ordered {
            if request.operation == OperationKind::Uninstall {
                steps.push(Box::new(UninstallStep::new(id.clone(), request.purge_data)));
                continue;
            }

            let Some(component) = manifest.component(id) else {
                continue;
            };
            if is_current(state, component) {
                log::debug!("{} is already at {}", component.id, component.version);
                continue;
            }

            let artifact = self.select_artifact(manifest, component)?;
            steps.push(Box::new(InstallOrUpdateStep::new(
                component.clone(),
                artifact.clone(),
            )));
        }
        Ok(steps)
    }
}

impl Planner for PlanBuilder {
    fn build(
        &self,
        request: &WizardRequest,
        manifest: &ManifestDocument,
        state: &WizardState,
    ) -> Result<ExecutionPlan> {
        ensure_unique_ids(manifest)?;
        let mut selection = select_targets(request, manifest, state);
        let external = resolve_dependencies(request, manifest, state, &mut selection)?;
        let graph = dependency_graph(request, manifest, &selection);

        let mut ordered = graph.topological_order()?;
        if request.operation == OperationKind::Uninstall {
            ordered.reverse();
        }
        log::debug!("Component order: {}", ordered.join(" -> "));

        let mut steps = validation_steps(request, &external);
        steps.extend(self.component_steps(request, manifest, state, &ordered)?);

        Ok(ExecutionPlan {
            run_id: Uuid::new_v4(),
            operation: request.operation,
            request: request.clone(),
            manifest: manifest.clone(),
            initial_state: clone_state(state),
            target_state: target_state(request, manifest, state, &ordered),
            steps,
        })
    }
}

/// Component ids and dependency ids must each be unique, ignoring case.
fn ensure_unique_ids(manifest: &ManifestDocument) -> Result<()> {
    let mut components = IdSet::new();
    for component in &manifest.components {
        if !components.insert(&component.id) {
            return Err(Error::validation(format!(
                "Manifest '{}' lists component '{}' more than once.",
                manifest.manifest_version, component.id
            )));
        }
    }
    let mut dependencies = IdSet::new();
    for dependency in &manifest.dependencies {
        if !dependencies.insert(&dependency.id) {
            return Err(Error::validation(format!(
                "Manifest '{}' lists dependency '{}' more than once.",
                manifest.manifest_version, dependency.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Selection
// ============================================================================

/// Explicit targets win. Otherwise the operation decides.
fn select_targets(
    request: &WizardRequest,
    manifest: &ManifestDocument,
    state: &WizardState,
) -> IdSet {
    if !request.target_component_ids.is_empty() {
        return request
            .target_component_ids
            .iter()
            .map(String::as_str)
            .collect();
    }

    let defaults = || -> IdSet { manifest.default_components().map(|c| c.id.as_str()).collect() };
    match request.operation {
        OperationKind::Install => defaults(),
        OperationKind::Update if state.components.is_empty() => defaults(),
        OperationKind::Update | OperationKind::Uninstall => state.installed_ids().collect(),
    }
}

fn effective_policy(
    request: &WizardRequest,
    dependency_id: &str,
    default: DependencyPolicy,
) -> DependencyPolicy {
    request.policy_override(dependency_id).unwrap_or(default)
}

/// Grow `selection` until every managed dependency is in it.
///
/// Returns the external dependency ids the selection needs. Terminates
/// because the selection only grows and the manifest is finite.
fn resolve_dependencies(
    request: &WizardRequest,
    manifest: &ManifestDocument,
    state: &WizardState,
    selection: &mut IdSet,
) -> Result<IdSet> {
    let mut external = IdSet::new();
    let mut worklist: VecDeque<String> = selection.iter().map(ToString::to_string).collect();

    while let Some(component_id) = worklist.pop_front() {
        let Some(component) = manifest.component(&component_id) else {
            if request.operation == OperationKind::Uninstall {
                continue;
            }
            return Err(Error::validation(format!(
                "Component '{component_id}' is not present in the manifest."
            )));
        };

        for dependency_id in &component.dependency_ids {
            let dependency = manifest.dependency(dependency_id).ok_or_else(|| {
                Error::validation(format!(
                    "Dependency '{dependency_id}' required by component '{component_id}' is missing in the manifest."
                ))
            })?;

            match effective_policy(request, dependency_id, dependency.default_policy) {
                DependencyPolicy::Managed => {
                    let managed = dependency.managed_component().ok_or_else(|| {
                        Error::validation(format!(
                            "Dependency '{dependency_id}' does not define a managed component."
                        ))
                    })?;
                    if manifest.component(managed).is_none() {
                        return Err(Error::validation(format!(
                            "Managed component '{managed}' for dependency '{dependency_id}' is missing in the manifest."
                        )));
                    }
                    if selection.insert(managed) {
                        worklist.push_back(managed.to_string());
                    }
                }
                DependencyPolicy::External => {
                    if request.endpoint_for(dependency_id).is_none()
                        && state.external_dependency(dependency_id).is_none()
                    {
                        return Err(Error::dependency(format!(
                            "Dependency '{dependency_id}' is external but no endpoint was provided."
                        )));
                    }
                    external.insert(dependency_id);
                }
            }
        }
    }

    Ok(external)
}

// ============================================================================
// Graph
// ============================================================================

/// Explicit `dependsOn` edges inside the selection plus edges to managed
/// dependency components.
fn dependency_graph(
    request: &WizardRequest,
    manifest: &ManifestDocument,
    selection: &IdSet,
) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for id in selection.iter() {
        graph.add_node(id);
    }

    for id in selection.iter() {
        let Some(component) = manifest.component(id) else {
            continue;
        };

        for depends_on in &component.depends_on_component_ids {
            if selection.contains(depends_on) {
                graph.add_edge(id, depends_on);
            }
        }

        for dependency_id in &component.dependency_ids {
            let Some(dependency) = manifest.dependency(dependency_id) else {
                continue;
            };
            let policy = effective_policy(request, dependency_id, dependency.default_policy);
            if let (DependencyPolicy::Managed, Some(managed)) = (policy, dependency.managed_component()) {
                graph.add_edge(id, managed);
            }
        }
    }
    graph
}

// ============================================================================
// Steps and target state
// ============================================================================

fn validation_steps(request: &WizardRequest, external: &IdSet) -> Vec<BoxedStep> {
    if request.operation == OperationKind::Uninstall {
        return Vec::new();
    }

    // Endpoints already validated in state are not probed again.
    external
        .iter()
        .filter_map(|id| {
            request.endpoint_for(id).map(|endpoint| {
                Box::new(ValidateDependencyStep::new(id, endpoint.clone())) as BoxedStep
            })
        })
        .collect()
}

fn is_current(state: &WizardState, component: &ComponentManifest) -> bool {
    state
        .component(&component.id)
        .is_some_and(|installed| installed.version.to_lowercase() == component.version.to_lowercase())
}

fn target_state(
    request: &WizardRequest,
    manifest: &ManifestDocument,
    state: &WizardState,
    ordered: &[String],
) -> WizardState {
    let mut target = clone_state(state);
    target.last_manifest_version = Some(manifest.manifest_version.clone());
    target.updated_at_utc = Utc::now();

    if request.operation == OperationKind::Uninstall {
        for id in ordered {
            target.remove_component(id);
        }
        return target;
    }

    for id in ordered {
        let Some(component) = manifest.component(id) else {
            continue;
        };
        target.upsert_component(InstalledComponentState {
            component_id: component.id.clone(),
            version: component.version.clone(),
            installed_path: request.component_install_path(&component.id, &component.version),
            service_name: component.service_name().to_string(),
            installed_at_utc: Utc::now(),
        });
    }
    target
}
