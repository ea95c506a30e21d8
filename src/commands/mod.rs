pub mod completions;
pub mod journal;
pub mod plan;
pub mod run;
pub mod state;

use crate::Context;
use crate::cli::RequestArgs;
use crate::config::{self, Config};
use crate::paths;
use anyhow::{Context as _, Result};
use edgeplan::domain::{AuthOptions, DEFAULT_CHANNEL, OperationKind, TlsOptions, WizardRequest};
use edgeplan::{Engine, PlanBuilder, PlanRunner, ids};
use hostkit::{
    CommandProcessRunner, HttpArtifactDownloader, HttpManifestClient, JsonStateStore,
    Sha256Verifier, default_service_manager,
};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Built-in file locations used when neither a flag nor the config names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub cache_dir: PathBuf,
    pub state_file: PathBuf,
    pub journal_file: PathBuf,
}

impl Defaults {
    /// Defaults under the edgeward state directory.
    pub fn resolve() -> Result<Self> {
        Ok(Self::under(&paths::state_dir()?))
    }

    pub fn under(state_dir: &std::path::Path) -> Self {
        Self {
            cache_dir: state_dir.join(paths::CACHE_DIR),
            state_file: state_dir.join(paths::STATE_FILE),
            journal_file: state_dir.join(paths::JOURNAL_FILE),
        }
    }
}

/// Load the config file named on the command line, or the default one.
pub fn load_config(ctx: &Context) -> Result<Config> {
    let path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };
    Config::load(&path)
}

/// Merge flags, config file and defaults into an engine request.
///
/// A flag wins over the config file, which wins over the defaults. Missing
/// base URIs are left blank for the engine to reject.
pub fn build_request(
    operation: OperationKind,
    args: &RequestArgs,
    config: &Config,
    defaults: &Defaults,
) -> Result<WizardRequest> {
    let api_base_uri = args
        .api_base_uri
        .clone()
        .or_else(|| config.api_base_uri.clone())
        .unwrap_or_default();

    let mut request = WizardRequest::new(operation, api_base_uri);
    request.channel = args
        .channel
        .clone()
        .or_else(|| config.channel.clone())
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

    request.cache_directory_path = args
        .cache_dir
        .clone()
        .or_else(|| config::expand_opt(config.cache_dir.as_deref()))
        .unwrap_or_else(|| defaults.cache_dir.clone());
    request.state_file_path = args
        .state_file
        .clone()
        .or_else(|| config::expand_opt(config.state_file.as_deref()))
        .unwrap_or_else(|| defaults.state_file.clone());
    request.journal_file_path = args
        .journal_file
        .clone()
        .or_else(|| config::expand_opt(config.journal_file.as_deref()))
        .unwrap_or_else(|| defaults.journal_file.clone());

    request.target_component_ids = args.targets.clone();

    request.authentication = AuthOptions {
        bearer_token: args.bearer_token.clone().filter(|t| !t.trim().is_empty()),
        bearer_token_file_path: args
            .bearer_token_file
            .clone()
            .or_else(|| config::expand_opt(config.auth.bearer_token_file.as_deref())),
        client_certificate_file_path: args
            .client_cert
            .clone()
            .or_else(|| config::expand_opt(config.auth.client_certificate_file.as_deref())),
        client_certificate_key_file_path: args
            .client_key
            .clone()
            .or_else(|| config::expand_opt(config.auth.client_certificate_key_file.as_deref())),
    };
    request.tls = TlsOptions {
        allow_insecure_server_certificate: args.insecure || config.tls.allow_insecure,
        custom_ca_certificate_file_path: args
            .ca_cert
            .clone()
            .or_else(|| config::expand_opt(config.tls.ca_certificate_file.as_deref())),
    };

    for (id, dependency) in &config.dependencies {
        if let Some(policy) = dependency.policy {
            request.dependency_policies.insert(id.clone(), policy);
        }
        if let Some(endpoint) = dependency.endpoint.as_deref() {
            let url = Url::parse(endpoint.trim()).with_context(|| {
                format!("Invalid endpoint '{endpoint}' for dependency '{id}' in config")
            })?;
            request.external_dependency_endpoints.insert(id.clone(), url);
        }
    }

    // Flags replace config entries for the same id, whatever its case.
    for (id, policy) in &args.dependency_policies {
        ids::remove(&mut request.dependency_policies, id);
        request.dependency_policies.insert(id.clone(), *policy);
    }
    for (id, url) in &args.external_endpoints {
        ids::remove(&mut request.external_dependency_endpoints, id);
        request
            .external_dependency_endpoints
            .insert(id.clone(), url.clone());
    }

    if request.tls.allow_insecure_server_certificate {
        log::warn!("Server certificate verification is disabled");
    }
    Ok(request)
}

/// Wire the engine to the host collaborators.
pub fn host_engine() -> Result<Engine> {
    let store = Arc::new(JsonStateStore::new());
    let services = default_service_manager(Arc::new(CommandProcessRunner))?;
    let platform = hostkit::platform::detect();
    log::debug!("Host platform: {platform}");

    let runner = PlanRunner::new(
        Arc::new(HttpArtifactDownloader::new()),
        Arc::new(Sha256Verifier),
        store.clone(),
        services,
    );
    Ok(Engine::new(
        Arc::new(HttpManifestClient::new()),
        store,
        Box::new(PlanBuilder::new(platform)),
        Box::new(runner),
    ))
}
