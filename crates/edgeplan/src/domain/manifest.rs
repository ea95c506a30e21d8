//! Manifest documents fetched from the distribution service.

use crate::ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;

/// Snapshot of every deployable component for one release channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    pub manifest_version: String,
    #[serde(default)]
    pub published_at_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub components: Vec<ComponentManifest>,
    #[serde(default)]
    pub dependencies: Vec<DependencyManifest>,
}

impl ManifestDocument {
    /// Find a component by id, ignoring case.
    #[must_use]
    pub fn component(&self, id: &str) -> Option<&ComponentManifest> {
        self.components.iter().find(|c| ids::same(&c.id, id))
    }

    /// Find a dependency entry by id, ignoring case.
    #[must_use]
    pub fn dependency(&self, id: &str) -> Option<&DependencyManifest> {
        self.dependencies.iter().find(|d| ids::same(&d.id, id))
    }

    /// Components installed when no explicit targets are requested.
    pub fn default_components(&self) -> impl Iterator<Item = &ComponentManifest> {
        self.components.iter().filter(|c| c.enabled_by_default)
    }
}

/// A deployable unit mapped to one host service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub depends_on_component_ids: Vec<String>,
    #[serde(default)]
    pub dependency_ids: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactManifest>,
    #[serde(default)]
    pub service: ServiceDefinition,
}

fn default_enabled() -> bool {
    true
}

impl ComponentManifest {
    /// Pick the artifact built for `os`/`architecture`, ignoring case.
    #[must_use]
    pub fn artifact_for(&self, os: &str, architecture: &str) -> Option<&ArtifactManifest> {
        self.artifacts.iter().find(|a| {
            a.os.eq_ignore_ascii_case(os) && a.architecture.eq_ignore_ascii_case(architecture)
        })
    }

    /// Service name, defaulting to the component id.
    #[must_use]
    pub fn service_name(&self) -> &str {
        if self.service.service_name.trim().is_empty() {
            &self.id
        } else {
            &self.service.service_name
        }
    }
}

/// One platform build of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub os: String,
    pub architecture: String,
    pub download_uri: String,
    pub file_name: String,
    pub sha256: String,
}

impl ArtifactManifest {
    /// Last path component of `file_name`. `None` for names such as `..`
    /// or `/` that have none.
    #[must_use]
    pub fn local_file_name(&self) -> Option<&OsStr> {
        std::path::Path::new(&self.file_name).file_name()
    }
}

/// A named requirement that is either installed from the manifest or
/// provided by an external endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub default_policy: DependencyPolicy,
    #[serde(default)]
    pub managed_component_id: Option<String>,
}

impl DependencyManifest {
    /// Managed component id, ignoring blank values.
    #[must_use]
    pub fn managed_component(&self) -> Option<&str> {
        self.managed_component_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

/// How a dependency is satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    /// Installed from another component of the same manifest.
    #[default]
    Managed,
    /// Provided by a pre-existing endpoint.
    External,
}

impl fmt::Display for DependencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::External => write!(f, "external"),
        }
    }
}

impl FromStr for DependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "managed" => Ok(Self::Managed),
            "external" => Ok(Self::External),
            other => Err(format!(
                "unknown dependency policy '{other}' (expected 'managed' or 'external')"
            )),
        }
    }
}

/// Host service description carried by a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDefinition {
    pub service_name: String,
    pub display_name: String,
    pub executable_path: String,
    pub arguments: Vec<String>,
    pub working_directory_path: String,
    pub environment_variables: BTreeMap<String, String>,
}

/// Observed state of a host service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceStatus {
    Unknown,
    Running,
    Stopped,
    NotFound,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}
