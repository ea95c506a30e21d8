//! Reachability probe for external dependencies.

use crate::domain::ExternalDependencyState;
use crate::error::{Error, Result};
use crate::plan::{PlanStep, StepContext, StepResult};
use chrono::Utc;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use url::Url;

/// Upper bound for one connection attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Confirms an external endpoint accepts TCP connections.
#[derive(Debug, Clone)]
pub struct ValidateDependencyStep {
    dependency_id: String,
    endpoint: Url,
}

impl ValidateDependencyStep {
    pub fn new(dependency_id: impl Into<String>, endpoint: Url) -> Self {
        Self {
            dependency_id: dependency_id.into(),
            endpoint,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Host and port to probe. Missing ports default from the scheme.
    fn target(&self) -> Result<(String, u16)> {
        let scheme = self.endpoint.scheme();
        let port = match self.endpoint.port() {
            Some(port) => port,
            None => match scheme {
                "http" => 80,
                "https" => 443,
                _ => {
                    return Err(Error::dependency(format!(
                        "Unsupported endpoint scheme '{scheme}' for dependency '{}'.",
                        self.dependency_id
                    )));
                }
            },
        };
        let host = self
            .endpoint
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| self.unreachable())?;
        Ok((host.trim_matches(['[', ']']).to_string(), port))
    }

    fn unreachable(&self) -> Error {
        Error::dependency(format!(
            "Failed to connect to external dependency '{}' at '{}'.",
            self.dependency_id, self.endpoint
        ))
    }

    fn probe(&self) -> Result<()> {
        let (host, port) = self.target()?;
        let addrs: Vec<SocketAddr> = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| {
                log::debug!("Could not resolve {host}:{port}: {e}");
                self.unreachable()
            })?
            .collect();

        for addr in &addrs {
            match TcpStream::connect_timeout(addr, PROBE_TIMEOUT) {
                Ok(_) => return Ok(()),
                Err(e) => log::debug!("Probe to {addr} failed: {e}"),
            }
        }
        Err(self.unreachable())
    }
}

impl PlanStep for ValidateDependencyStep {
    fn id(&self) -> String {
        format!("dependency.validate.{}", self.dependency_id)
    }

    fn name(&self) -> String {
        format!("Validate external dependency '{}'", self.dependency_id)
    }

    fn is_reversible(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<StepResult> {
        let id = &self.dependency_id;
        if ctx.dry_run {
            return Ok(StepResult::success(format!(
                "Dry-run: skipped connectivity probe for {id}."
            )));
        }

        self.probe()?;

        ctx.state.upsert_external_dependency(ExternalDependencyState {
            dependency_id: id.clone(),
            endpoint: self.endpoint.clone(),
            validated_at_utc: Utc::now(),
        });
        Ok(StepResult::success(format!(
            "External dependency '{id}' is reachable."
        )))
    }

    fn rollback(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        ctx.state.remove_external_dependency(&self.dependency_id);
        Ok(())
    }
}
