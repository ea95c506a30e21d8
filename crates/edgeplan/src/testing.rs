//! In-memory doubles shared by the unit tests.

use crate::backend::{
    ArtifactDownload, ArtifactDownloader, ChecksumVerifier, DownloadContext, ManifestClient,
    ManifestQuery, ServiceManager, StateStore,
};
use crate::cancel::CancellationToken;
use crate::domain::{
    ArtifactManifest, ComponentManifest, DependencyManifest, DependencyPolicy, InstalledComponentState,
    JournalEntry, JournalEvent, ManifestDocument, ServiceDefinition, ServiceStatus, WizardRequest,
    WizardState,
};
use crate::error::{Error, Result};
use crate::plan::{BoxedStep, ExecutionPlan, PlanRunner, PlanStep, StepContext, StepResult};
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

pub fn linux_artifact(id: &str) -> ArtifactManifest {
    ArtifactManifest {
        os: "linux".into(),
        architecture: "x64".into(),
        download_uri: format!("https://cdn.supply.local/{id}.bin"),
        file_name: format!("{id}.bin"),
        sha256: format!("sha-{id}"),
    }
}

pub fn component(id: &str, version: &str) -> ComponentManifest {
    let mut display = id.to_string();
    if let Some(first) = display.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    ComponentManifest {
        id: id.into(),
        display_name: display,
        version: version.into(),
        enabled_by_default: true,
        depends_on_component_ids: Vec::new(),
        dependency_ids: Vec::new(),
        artifacts: vec![linux_artifact(id)],
        service: ServiceDefinition {
            executable_path: format!("bin/{id}"),
            ..ServiceDefinition::default()
        },
    }
}

pub fn managed_dependency(id: &str, component_id: &str) -> DependencyManifest {
    DependencyManifest {
        id: id.into(),
        display_name: id.into(),
        default_policy: DependencyPolicy::Managed,
        managed_component_id: Some(component_id.into()),
    }
}

pub fn manifest(
    components: Vec<ComponentManifest>,
    dependencies: Vec<DependencyManifest>,
) -> ManifestDocument {
    ManifestDocument {
        manifest_version: "2024.10.1".into(),
        published_at_utc: None,
        components,
        dependencies,
    }
}

pub fn empty_plan(request: &WizardRequest) -> ExecutionPlan {
    ExecutionPlan {
        run_id: Uuid::new_v4(),
        operation: request.operation,
        request: request.clone(),
        manifest: ManifestDocument::default(),
        initial_state: WizardState::default(),
        target_state: WizardState::default(),
        steps: Vec::new(),
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// State store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<WizardState>>,
    journal: Mutex<Vec<JournalEntry>>,
    saves: AtomicUsize,
    fail_saves: Mutex<bool>,
}

impl MemoryStateStore {
    pub fn with_state(state: WizardState) -> Self {
        let store = Self::default();
        *store.state.lock().unwrap() = Some(state);
        store
    }

    pub fn fail_saves(&self) {
        *self.fail_saves.lock().unwrap() = true;
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Option<WizardState> {
        self.state.lock().unwrap().clone()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<JournalEvent> {
        self.journal().into_iter().map(|e| e.event_type).collect()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, _path: &Path) -> Result<WizardState> {
        Ok(self.state.lock().unwrap().clone().unwrap_or_default())
    }

    fn save(&self, _path: &Path, state: &WizardState) -> Result<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(Error::Other("disk full".into()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }

    fn append_journal(&self, _path: &Path, entry: &JournalEntry) -> Result<()> {
        self.journal.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Manifest client returning a fixed document or error.
pub struct StaticManifestClient {
    manifest: Mutex<Option<ManifestDocument>>,
    failure: Mutex<Option<fn() -> Error>>,
    queries: Mutex<Vec<ManifestQuery>>,
}

impl StaticManifestClient {
    pub fn new(manifest: ManifestDocument) -> Self {
        Self {
            manifest: Mutex::new(Some(manifest)),
            failure: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: fn() -> Error) -> Self {
        Self {
            manifest: Mutex::new(None),
            failure: Mutex::new(Some(failure)),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<ManifestQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl ManifestClient for StaticManifestClient {
    fn get_manifest(&self, query: &ManifestQuery) -> Result<ManifestDocument> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(failure) = *self.failure.lock().unwrap() {
            return Err(failure());
        }
        Ok(self.manifest.lock().unwrap().clone().unwrap_or_default())
    }
}

/// Downloader that writes a small file per artifact.
pub struct FakeDownloader {
    root: PathBuf,
    downloads: AtomicUsize,
}

impl FakeDownloader {
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ArtifactDownloader for FakeDownloader {
    fn download(
        &self,
        artifact: &ArtifactManifest,
        _context: &DownloadContext,
    ) -> Result<ArtifactDownload> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let name = artifact
            .local_file_name()
            .unwrap_or(std::ffi::OsStr::new("artifact.bin"));
        let path = self.root.join(name);
        fs::write(&path, artifact.download_uri.as_bytes()).map_err(|e| Error::io(&path, e))?;
        Ok(ArtifactDownload {
            file_path: path,
            reused_from_cache: false,
        })
    }
}

/// Verifier that accepts everything except files it was told to reject.
#[derive(Default)]
pub struct FakeVerifier {
    rejected: Mutex<BTreeSet<String>>,
    verified: Mutex<Vec<String>>,
}

impl FakeVerifier {
    pub fn reject(&self, file_name: &str) {
        self.rejected.lock().unwrap().insert(file_name.to_string());
    }

    pub fn verified(&self) -> Vec<String> {
        self.verified.lock().unwrap().clone()
    }
}

impl ChecksumVerifier for FakeVerifier {
    fn verify_sha256(&self, file_path: &Path, expected_hex: &str) -> Result<()> {
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.rejected.lock().unwrap().contains(&name) {
            return Err(Error::integrity(format!(
                "Checksum verification failed for '{}'.",
                file_path.display()
            )));
        }
        self.verified.lock().unwrap().push(expected_hex.to_string());
        Ok(())
    }
}

/// Service manager that records every mutating call.
#[derive(Default)]
pub struct RecordingServiceManager {
    calls: Mutex<Vec<String>>,
    existing: Mutex<BTreeSet<String>>,
    running: Mutex<BTreeSet<String>>,
    failing: Mutex<BTreeSet<String>>,
    definitions: Mutex<Vec<ServiceDefinition>>,
}

impl RecordingServiceManager {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn add_existing(&self, name: &str) {
        self.existing.lock().unwrap().insert(name.to_string());
    }

    /// Register `name` as an installed service that is currently running.
    pub fn add_running(&self, name: &str) {
        self.add_existing(name);
        self.running.lock().unwrap().insert(name.to_string());
    }

    /// Make every call of `operation` ("create", "start", "stop", "delete") fail.
    pub fn fail_on(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    pub fn last_definition(&self) -> Option<ServiceDefinition> {
        self.definitions.lock().unwrap().last().cloned()
    }

    fn record(&self, operation: &str, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{operation} {name}"));
        if self.failing.lock().unwrap().contains(operation) {
            return Err(Error::Other(format!("{operation} {name} failed")));
        }
        Ok(())
    }
}

impl ServiceManager for RecordingServiceManager {
    fn exists(&self, service_name: &str) -> Result<bool> {
        Ok(self.existing.lock().unwrap().contains(service_name))
    }

    fn create_or_update(&self, definition: &ServiceDefinition) -> Result<()> {
        self.record("create", &definition.service_name)?;
        self.definitions.lock().unwrap().push(definition.clone());
        self.add_existing(&definition.service_name);
        Ok(())
    }

    fn start(&self, service_name: &str) -> Result<()> {
        self.record("start", service_name)?;
        self.running.lock().unwrap().insert(service_name.to_string());
        Ok(())
    }

    fn stop(&self, service_name: &str) -> Result<()> {
        self.record("stop", service_name)?;
        self.running.lock().unwrap().remove(service_name);
        Ok(())
    }

    fn delete(&self, service_name: &str) -> Result<()> {
        self.record("delete", service_name)?;
        self.existing.lock().unwrap().remove(service_name);
        self.running.lock().unwrap().remove(service_name);
        Ok(())
    }

    fn status(&self, service_name: &str) -> Result<ServiceStatus> {
        Ok(if self.running.lock().unwrap().contains(service_name) {
            ServiceStatus::Running
        } else if self.existing.lock().unwrap().contains(service_name) {
            ServiceStatus::Stopped
        } else {
            ServiceStatus::NotFound
        })
    }
}

/// A full set of doubles rooted in a temp directory.
pub struct Harness {
    pub store: Arc<MemoryStateStore>,
    pub downloader: Arc<FakeDownloader>,
    pub verifier: Arc<FakeVerifier>,
    pub services: Arc<RecordingServiceManager>,
}

impl Harness {
    pub fn new(temp: &TempDir) -> Self {
        Self {
            store: Arc::new(MemoryStateStore::default()),
            downloader: Arc::new(FakeDownloader {
                root: temp.path().join("downloads"),
                downloads: AtomicUsize::new(0),
            }),
            verifier: Arc::new(FakeVerifier::default()),
            services: Arc::new(RecordingServiceManager::default()),
        }
    }

    pub fn runner(&self) -> PlanRunner {
        PlanRunner::new(
            self.downloader.clone(),
            self.verifier.clone(),
            self.store.clone(),
            self.services.clone(),
        )
    }

    /// Call `f` with a step context over `state`.
    pub fn run_step<F>(
        &self,
        request: &WizardRequest,
        state: &mut WizardState,
        dry_run: bool,
        f: F,
    ) -> Result<StepResult>
    where
        F: FnOnce(&mut StepContext<'_>) -> Result<StepResult>,
    {
        let manifest = ManifestDocument::default();
        let mut ctx = StepContext {
            run_id: Uuid::nil(),
            dry_run,
            request,
            manifest: &manifest,
            downloader: self.downloader.as_ref(),
            verifier: self.verifier.as_ref(),
            services: self.services.as_ref(),
            state,
        };
        f(&mut ctx)
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Ordered record of step calls across a plan.
#[derive(Debug, Clone, Default)]
pub struct StepLog(Arc<Mutex<Vec<String>>>);

impl StepLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeed,
    Fail,
    Raise,
}

/// Configurable step that records into a [`StepLog`] and marks itself
/// installed in the working state.
#[derive(Debug)]
pub struct FakeStep {
    key: String,
    log: StepLog,
    outcome: Outcome,
    reversible: bool,
    rollback_fails: bool,
    cancels: Option<CancellationToken>,
}

impl FakeStep {
    fn new(key: &str, log: &StepLog, outcome: Outcome) -> Self {
        Self {
            key: key.into(),
            log: log.clone(),
            outcome,
            reversible: true,
            rollback_fails: false,
            cancels: None,
        }
    }

    pub fn ok(key: &str, log: &StepLog) -> Self {
        Self::new(key, log, Outcome::Succeed)
    }

    pub fn failing(key: &str, log: &StepLog) -> Self {
        Self::new(key, log, Outcome::Fail)
    }

    pub fn raising(key: &str, log: &StepLog) -> Self {
        Self::new(key, log, Outcome::Raise)
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    pub fn rollback_fails(mut self) -> Self {
        self.rollback_fails = true;
        self
    }

    pub fn cancels(mut self, token: &CancellationToken) -> Self {
        self.cancels = Some(token.clone());
        self
    }

    pub fn boxed(self) -> BoxedStep {
        Box::new(self)
    }
}

impl PlanStep for FakeStep {
    fn id(&self) -> String {
        format!("fake.{}", self.key)
    }

    fn name(&self) -> String {
        format!("Fake '{}'", self.key)
    }

    fn is_reversible(&self) -> bool {
        self.reversible
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<StepResult> {
        self.log.push(format!("execute {}", self.key));
        if let Some(token) = &self.cancels {
            token.cancel();
        }
        match self.outcome {
            Outcome::Succeed => {
                ctx.state.upsert_component(InstalledComponentState {
                    component_id: self.key.clone(),
                    version: "1.0.0".into(),
                    installed_path: PathBuf::from("/tmp").join(&self.key),
                    service_name: self.key.clone(),
                    installed_at_utc: Utc::now(),
                });
                Ok(StepResult::success(format!("{} done", self.key)))
            }
            Outcome::Fail => Ok(StepResult::failure(format!("{} broke", self.key))),
            Outcome::Raise => Err(Error::Other(format!("{} exploded", self.key))),
        }
    }

    fn rollback(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        self.log.push(format!("rollback {}", self.key));
        if self.rollback_fails {
            return Err(Error::Other(format!("{} cannot be undone", self.key)));
        }
        ctx.state.remove_component(&self.key);
        Ok(())
    }
}
