//! Persisted host state: what is currently applied on this machine.

use crate::ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

/// Current schema version written to the state file.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Installed components and validated external endpoints.
///
/// Map keys are ids and compare case-insensitively through the accessor
/// methods. Planning diffs the manifest against this aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    #[serde(default = "default_schema")]
    pub schema_version: u32,
    #[serde(default = "Utc::now")]
    pub updated_at_utc: DateTime<Utc>,
    #[serde(default)]
    pub last_manifest_version: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, InstalledComponentState>,
    #[serde(default)]
    pub external_dependencies: BTreeMap<String, ExternalDependencyState>,
}

fn default_schema() -> u32 {
    STATE_SCHEMA_VERSION
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            updated_at_utc: Utc::now(),
            last_manifest_version: None,
            components: BTreeMap::new(),
            external_dependencies: BTreeMap::new(),
        }
    }
}

impl WizardState {
    #[must_use]
    pub fn component(&self, id: &str) -> Option<&InstalledComponentState> {
        ids::lookup(&self.components, id)
    }

    #[must_use]
    pub fn is_installed(&self, id: &str) -> bool {
        self.component(id).is_some()
    }

    /// Insert or replace the record for `record.component_id`.
    pub fn upsert_component(&mut self, record: InstalledComponentState) {
        ids::remove(&mut self.components, &record.component_id);
        self.components.insert(record.component_id.clone(), record);
    }

    pub fn remove_component(&mut self, id: &str) -> Option<InstalledComponentState> {
        ids::remove(&mut self.components, id)
    }

    #[must_use]
    pub fn external_dependency(&self, id: &str) -> Option<&ExternalDependencyState> {
        ids::lookup(&self.external_dependencies, id)
    }

    /// Insert or replace the record for `record.dependency_id`.
    pub fn upsert_external_dependency(&mut self, record: ExternalDependencyState) {
        ids::remove(&mut self.external_dependencies, &record.dependency_id);
        self.external_dependencies
            .insert(record.dependency_id.clone(), record);
    }

    pub fn remove_external_dependency(&mut self, id: &str) -> Option<ExternalDependencyState> {
        ids::remove(&mut self.external_dependencies, id)
    }

    /// Ids of installed components.
    pub fn installed_ids(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// A component that has been installed on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledComponentState {
    pub component_id: String,
    pub version: String,
    pub installed_path: PathBuf,
    #[serde(default)]
    pub service_name: String,
    pub installed_at_utc: DateTime<Utc>,
}

/// An external dependency endpoint that passed a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDependencyState {
    pub dependency_id: String,
    pub endpoint: Url,
    pub validated_at_utc: DateTime<Utc>,
}
