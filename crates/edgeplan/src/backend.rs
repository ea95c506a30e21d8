//! Collaborator traits.
//!
//! The planner and runner reach the outside world only through these
//! traits. Concrete implementations live in the `hostkit` crate; tests use
//! in-memory doubles.
//!
//! All traits are object safe and `Send + Sync` so they can be shared
//! behind `Arc<dyn ...>`.

use crate::domain::{
    ArtifactManifest, AuthOptions, JournalEntry, ManifestDocument, ServiceDefinition,
    ServiceStatus, TlsOptions, WizardState,
};
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Manifest retrieval
// ============================================================================

/// Parameters for one manifest fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestQuery {
    pub api_base_uri: String,
    pub channel: String,
    pub authentication: AuthOptions,
    pub tls: TlsOptions,
}

/// Fetches the manifest for a channel.
///
/// Fails with [`Error::ApiAccess`](crate::Error::ApiAccess) on transport
/// failure, a non-success status or an empty or invalid body.
pub trait ManifestClient: Send + Sync {
    fn get_manifest(&self, query: &ManifestQuery) -> Result<ManifestDocument>;
}

// ============================================================================
// Persistence
// ============================================================================

/// Loads and saves host state and appends journal records.
pub trait StateStore: Send + Sync {
    /// Load state, returning an empty aggregate when the file is absent.
    fn load(&self, path: &Path) -> Result<WizardState>;

    /// Replace the state file atomically.
    fn save(&self, path: &Path, state: &WizardState) -> Result<()>;

    /// Append exactly one journal record.
    fn append_journal(&self, path: &Path, entry: &JournalEntry) -> Result<()>;
}

// ============================================================================
// Artifacts
// ============================================================================

/// Where and how to fetch artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadContext {
    pub cache_directory_path: PathBuf,
    pub authentication: AuthOptions,
    pub tls: TlsOptions,
}

/// A locally available artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDownload {
    pub file_path: PathBuf,
    pub reused_from_cache: bool,
}

/// Materializes an artifact into the local cache.
///
/// Cache entries are keyed by content hash and file name, so a hit skips
/// the transfer entirely.
pub trait ArtifactDownloader: Send + Sync {
    fn download(
        &self,
        artifact: &ArtifactManifest,
        context: &DownloadContext,
    ) -> Result<ArtifactDownload>;
}

/// Verifies file content against an expected digest.
pub trait ChecksumVerifier: Send + Sync {
    /// Fails with an integrity error on mismatch or missing file.
    fn verify_sha256(&self, file_path: &Path, expected_hex: &str) -> Result<()>;
}

// ============================================================================
// Services and processes
// ============================================================================

/// Platform service control.
pub trait ServiceManager: Send + Sync {
    fn exists(&self, service_name: &str) -> Result<bool>;
    fn create_or_update(&self, definition: &ServiceDefinition) -> Result<()>;
    fn start(&self, service_name: &str) -> Result<()>;
    fn stop(&self, service_name: &str) -> Result<()>;
    fn delete(&self, service_name: &str) -> Result<()>;
    fn status(&self, service_name: &str) -> Result<ServiceStatus>;
}

/// A process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub file_name: String,
    pub arguments: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

impl ProcessSpec {
    pub fn new<I, S>(file_name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_name: file_name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Command line for log and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        if self.arguments.is_empty() {
            self.file_name.clone()
        } else {
            format!("{} {}", self.file_name, self.arguments.join(" "))
        }
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external processes to completion.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput>;
}
