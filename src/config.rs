//! `edgeward.toml` loading.
//!
//! Every key is optional. Command-line flags win over the file, and the
//! file wins over the built-in defaults from [`crate::paths`].

use anyhow::{Context, Result};
use edgeplan::domain::DependencyPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_uri: Option<String>,
    pub channel: Option<String>,
    pub cache_dir: Option<String>,
    pub state_file: Option<String>,
    pub journal_file: Option<String>,
    pub auth: AuthConfig,
    pub tls: TlsConfig,
    /// Per-dependency overrides keyed by dependency id.
    pub dependencies: BTreeMap<String, DependencyConfig>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub bearer_token_file: Option<String>,
    pub client_certificate_file: Option<String>,
    pub client_certificate_key_file: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsConfig {
    pub allow_insecure: bool,
    pub ca_certificate_file: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyConfig {
    #[serde(with = "policy_name", skip_serializing_if = "Option::is_none")]
    pub policy: Option<DependencyPolicy>,
    pub endpoint: Option<String>,
}

impl Config {
    /// Load the config at `path`, or the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Expand an optional path string from the config file.
pub fn expand_opt(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(crate::paths::expand)
}

/// Accepts `policy = "External"` as well as `"external"`.
mod policy_name {
    use edgeplan::domain::DependencyPolicy;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        policy: &Option<DependencyPolicy>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match policy {
            Some(p) => serializer.serialize_str(&p.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DependencyPolicy>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}
