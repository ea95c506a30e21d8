//! Value types shared by the planner, the runner and the collaborators.

mod journal;
mod manifest;
mod platform;
mod request;
mod state;

pub use journal::{JournalEntry, JournalEvent};
pub use manifest::{
    ArtifactManifest, ComponentManifest, DependencyManifest, DependencyPolicy, ManifestDocument,
    ServiceDefinition, ServiceStatus,
};
pub use platform::Platform;
pub use request::{AuthOptions, DEFAULT_CHANNEL, OperationKind, TlsOptions, WizardRequest};
pub use state::{
    ExternalDependencyState, InstalledComponentState, STATE_SCHEMA_VERSION, WizardState,
};
