//! HTTP transport: manifest fetch and artifact download.
//!
//! Both clients build a `ureq` agent per call from the TLS and
//! authentication options carried by the request.

use crate::checksum::normalize_hex;
use edgeplan::backend::{
    ArtifactDownload, ArtifactDownloader, DownloadContext, ManifestClient, ManifestQuery,
};
use edgeplan::domain::{ArtifactManifest, AuthOptions, ManifestDocument, TlsOptions};
use edgeplan::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ureq::http::StatusCode;
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, RootCerts, TlsConfig};
use url::Url;

/// Per-request timeout for both manifest and artifact calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("edgeward/", env!("CARGO_PKG_VERSION"));
const MANIFEST_PATH: &str = "/api/wizard/manifest";

// =============================================================================
// Agent and credentials
// =============================================================================

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::api(format!(
            "Failed to read certificate file '{}': {e}",
            path.display()
        ))
    })
}

fn load_certificates(path: &Path) -> Result<Vec<Certificate<'static>>> {
    let pem = read_pem(path)?;
    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(&pem) {
        let item = item.map_err(|e| {
            Error::api(format!("Invalid certificate file '{}': {e}", path.display()))
        })?;
        if let PemItem::Certificate(cert) = item {
            certs.push(cert.to_owned());
        }
    }
    if certs.is_empty() {
        return Err(Error::api(format!(
            "Certificate file '{}' contains no certificates.",
            path.display()
        )));
    }
    Ok(certs)
}

fn client_certificate(auth: &AuthOptions) -> Result<Option<ClientCert>> {
    let Some(cert_path) = &auth.client_certificate_file_path else {
        return Ok(None);
    };
    let chain = load_certificates(cert_path)?;
    // Without a separate key file the key must sit next to the certificate.
    let key_path = auth
        .client_certificate_key_file_path
        .as_deref()
        .unwrap_or(cert_path);
    let key = PrivateKey::from_pem(&read_pem(key_path)?).map_err(|e| {
        Error::api(format!("Invalid private key file '{}': {e}", key_path.display()))
    })?;
    Ok(Some(ClientCert::new_with_certs(&chain, key)))
}

/// Agent honouring the TLS options. Status codes are not turned into errors
/// so callers can report them.
fn build_agent(auth: &AuthOptions, tls: &TlsOptions, timeout: Duration) -> Result<ureq::Agent> {
    let mut builder = TlsConfig::builder();
    if tls.allow_insecure_server_certificate {
        log::warn!("TLS certificate verification is disabled");
        builder = builder.disable_verification(true);
    } else if let Some(ca) = &tls.custom_ca_certificate_file_path {
        builder = builder.root_certs(RootCerts::new_with_certs(&load_certificates(ca)?));
    }
    if let Some(cert) = client_certificate(auth)? {
        builder = builder.client_cert(Some(cert));
    }

    let config = ureq::Agent::config_builder()
        .tls_config(builder.build())
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    Ok(ureq::Agent::new_with_config(config))
}

/// Bearer token from the inline value or the token file. Blank means none.
pub fn bearer_token(auth: &AuthOptions) -> Result<Option<String>> {
    if let Some(token) = auth.bearer_token.as_deref().map(str::trim)
        && !token.is_empty()
    {
        return Ok(Some(token.to_string()));
    }

    let Some(path) = &auth.bearer_token_file_path else {
        return Ok(None);
    };
    if !path.is_file() {
        return Err(Error::api(format!(
            "Token file '{}' does not exist.",
            path.display()
        )));
    }
    let token = fs::read_to_string(path).map_err(|e| {
        Error::api(format!("Failed to read token file '{}': {e}", path.display()))
    })?;
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

fn get(
    agent: &ureq::Agent,
    url: &str,
    token: Option<&str>,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let request = agent.get(url).header("User-Agent", USER_AGENT);
    match token {
        Some(token) => request.header("Authorization", format!("Bearer {token}")).call(),
        None => request.call(),
    }
}

fn status_text(status: StatusCode) -> String {
    format!(
        "{} ({})",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown")
    )
}

// =============================================================================
// Manifest client
// =============================================================================

/// Fetches `GET {base}/api/wizard/manifest?channel={channel}`.
#[derive(Debug, Clone)]
pub struct HttpManifestClient {
    timeout: Duration,
}

impl HttpManifestClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Manifest URL for a base URI and channel. Any path on the base is
    /// replaced.
    pub fn manifest_url(api_base_uri: &str, channel: &str) -> Result<Url> {
        let base = Url::parse(api_base_uri)
            .map_err(|e| Error::validation(format!("Invalid API base URI '{api_base_uri}': {e}")))?;
        let mut url = base
            .join(MANIFEST_PATH)
            .map_err(|e| Error::validation(format!("Invalid API base URI '{api_base_uri}': {e}")))?;
        url.query_pairs_mut().clear().append_pair("channel", channel);
        Ok(url)
    }
}

impl Default for HttpManifestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestClient for HttpManifestClient {
    fn get_manifest(&self, query: &ManifestQuery) -> Result<ManifestDocument> {
        let url = Self::manifest_url(&query.api_base_uri, &query.channel)?;
        let agent = build_agent(&query.authentication, &query.tls, self.timeout)?;
        let token = bearer_token(&query.authentication)?;

        log::info!("Fetching manifest from {url}");
        let mut response = get(&agent, url.as_str(), token.as_deref())
            .map_err(|e| Error::api(format!("Failed to retrieve manifest from '{url}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::api(format!(
                "Manifest request failed with status {}.",
                status_text(status)
            )));
        }

        response
            .body_mut()
            .read_json::<Option<ManifestDocument>>()
            .ok()
            .flatten()
            .ok_or_else(|| Error::api("Manifest response was empty or invalid."))
    }
}

// =============================================================================
// Artifact downloader
// =============================================================================

/// Downloads artifacts into a content-addressed cache directory.
///
/// Cache files are named `{sha256}_{file name}`. An existing cache file is
/// reused without touching the network; its checksum is verified later by
/// the install step like any fresh download.
#[derive(Debug, Clone)]
pub struct HttpArtifactDownloader {
    timeout: Duration,
}

impl HttpArtifactDownloader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Where `artifact` lives in `cache_dir`.
    pub fn cache_path(artifact: &ArtifactManifest, cache_dir: &Path) -> Result<PathBuf> {
        let file_name = artifact
            .local_file_name()
            .ok_or_else(|| {
                Error::integrity(format!(
                    "Artifact file name '{}' is invalid.",
                    artifact.file_name
                ))
            })?
            .to_string_lossy();
        Ok(cache_dir.join(format!("{}_{file_name}", normalize_hex(&artifact.sha256))))
    }

    fn fetch(
        &self,
        artifact: &ArtifactManifest,
        context: &DownloadContext,
        target: &Path,
    ) -> Result<()> {
        let agent = build_agent(&context.authentication, &context.tls, self.timeout)?;
        let token = bearer_token(&context.authentication)?;
        let failed = |detail: String| {
            Error::integrity(format!(
                "Failed to download artifact '{}' from '{}': {detail}",
                artifact.file_name, artifact.download_uri
            ))
        };

        let mut response = get(&agent, &artifact.download_uri, token.as_deref())
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::integrity(format!(
                "Artifact download failed with status {}.",
                status_text(status)
            )));
        }

        let mut file = File::create(target).map_err(|e| Error::io(target, e))?;
        io::copy(&mut response.body_mut().as_reader(), &mut file)
            .map_err(|e| failed(e.to_string()))?;
        file.sync_all().map_err(|e| Error::io(target, e))
    }
}

impl Default for HttpArtifactDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactDownloader for HttpArtifactDownloader {
    fn download(
        &self,
        artifact: &ArtifactManifest,
        context: &DownloadContext,
    ) -> Result<ArtifactDownload> {
        let cache_dir = &context.cache_directory_path;
        fs::create_dir_all(cache_dir).map_err(|e| Error::io(cache_dir, e))?;
        let cache_path = Self::cache_path(artifact, cache_dir)?;

        if cache_path.is_file() {
            log::debug!("Reusing cached {}", cache_path.display());
            return Ok(ArtifactDownload {
                file_path: cache_path,
                reused_from_cache: true,
            });
        }

        let mut tmp = cache_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        log::info!("Downloading {} from {}", artifact.file_name, artifact.download_uri);
        if let Err(e) = self.fetch(artifact, context, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &cache_path).map_err(|e| Error::io(&cache_path, e))?;

        Ok(ArtifactDownload {
            file_path: cache_path,
            reused_from_cache: false,
        })
    }
}
