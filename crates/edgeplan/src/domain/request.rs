//! Operator requests.

use super::DependencyPolicy;
use crate::ids;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Default release channel.
pub const DEFAULT_CHANNEL: &str = "stable";

/// What the operator asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Install,
    Update,
    Uninstall,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Update => write!(f, "update"),
            Self::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// One install, update or uninstall invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardRequest {
    pub operation: OperationKind,
    /// Base URI of the distribution service. Validated by the engine.
    pub api_base_uri: String,
    pub channel: String,
    pub dry_run: bool,
    pub auto_approve: bool,
    pub non_interactive: bool,
    /// Delete install directories on uninstall.
    pub purge_data: bool,
    pub cache_directory_path: PathBuf,
    pub state_file_path: PathBuf,
    pub journal_file_path: PathBuf,
    /// Explicit targets. Empty selects by the operation's default rule.
    pub target_component_ids: Vec<String>,
    pub dependency_policies: BTreeMap<String, DependencyPolicy>,
    pub external_dependency_endpoints: BTreeMap<String, Url>,
    pub authentication: AuthOptions,
    pub tls: TlsOptions,
}

impl WizardRequest {
    /// Create a request with default options.
    pub fn new(operation: OperationKind, api_base_uri: impl Into<String>) -> Self {
        Self {
            operation,
            api_base_uri: api_base_uri.into(),
            channel: DEFAULT_CHANNEL.to_string(),
            dry_run: false,
            auto_approve: false,
            non_interactive: false,
            purge_data: false,
            cache_directory_path: PathBuf::new(),
            state_file_path: PathBuf::new(),
            journal_file_path: PathBuf::new(),
            target_component_ids: Vec::new(),
            dependency_policies: BTreeMap::new(),
            external_dependency_endpoints: BTreeMap::new(),
            authentication: AuthOptions::default(),
            tls: TlsOptions::default(),
        }
    }

    /// Policy override for a dependency, if the operator gave one.
    #[must_use]
    pub fn policy_override(&self, dependency_id: &str) -> Option<DependencyPolicy> {
        ids::lookup(&self.dependency_policies, dependency_id).copied()
    }

    /// Endpoint override for an external dependency.
    #[must_use]
    pub fn endpoint_for(&self, dependency_id: &str) -> Option<&Url> {
        ids::lookup(&self.external_dependency_endpoints, dependency_id)
    }

    /// Directory holding the state file. Install roots live beside it.
    #[must_use]
    pub fn state_directory(&self) -> &Path {
        self.state_file_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Deterministic install location of one component version.
    #[must_use]
    pub fn component_install_path(&self, component_id: &str, version: &str) -> PathBuf {
        self.state_directory()
            .join("components")
            .join(component_id)
            .join(version)
    }
}

/// Credentials for outbound calls. Opaque to planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthOptions {
    pub bearer_token: Option<String>,
    pub bearer_token_file_path: Option<PathBuf>,
    pub client_certificate_file_path: Option<PathBuf>,
    pub client_certificate_key_file_path: Option<PathBuf>,
}

/// Transport security options for outbound calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsOptions {
    pub allow_insecure_server_certificate: bool,
    pub custom_ca_certificate_file_path: Option<PathBuf>,
}
