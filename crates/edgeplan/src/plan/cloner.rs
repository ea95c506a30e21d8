//! Deep copies of state aggregates.
//!
//! Plans keep an initial and a target snapshot, and the runner works on a
//! third copy. None of them may alias another.

use crate::domain::WizardState;

/// Independent copy of `state`. Mutating the copy never affects the source.
#[must_use]
pub fn clone_state(state: &WizardState) -> WizardState {
    WizardState {
        schema_version: state.schema_version,
        updated_at_utc: state.updated_at_utc,
        last_manifest_version: state.last_manifest_version.clone(),
        components: state
            .components
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect(),
        external_dependencies: state
            .external_dependencies
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExternalDependencyState, InstalledComponentState};
    use chrono::Utc;
    use std::path::PathBuf;
    use url::Url;

    fn populated() -> WizardState {
        let mut state = WizardState {
            last_manifest_version: Some("2024.1".into()),
            ..WizardState::default()
        };
        state.upsert_component(InstalledComponentState {
            component_id: "redis".into(),
            version: "7.2".into(),
            installed_path: PathBuf::from("/srv/components/redis/7.2"),
            service_name: "redis".into(),
            installed_at_utc: Utc::now(),
        });
        state.upsert_external_dependency(ExternalDependencyState {
            dependency_id: "postgres".into(),
            endpoint: Url::parse("tcp://db:5432").unwrap(),
            validated_at_utc: Utc::now(),
        });
        state
    }

    #[test]
    fn test_clone_is_equal() {
        let state = populated();
        assert_eq!(clone_state(&state), state);
    }

    #[test]
    fn test_clone_is_independent() {
        let state = populated();
        let mut copy = clone_state(&state);
        copy.remove_component("redis");
        copy.remove_external_dependency("postgres");
        copy.last_manifest_version = None;

        assert!(state.is_installed("redis"));
        assert!(state.external_dependency("postgres").is_some());
        assert_eq!(state.last_manifest_version.as_deref(), Some("2024.1"));
    }
}
