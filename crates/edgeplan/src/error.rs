//! Error types for planning and execution.
//!
//! Every failure raised by the planner, the steps or a collaborator is an
//! [`Error`]. Its [`ErrorCategory`] decides which [`ExitCode`] the engine
//! reports, and its message is surfaced to the operator verbatim.

use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for edgeplan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of failures, one per exit classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed request, manifest graph cycle, missing reference.
    InvalidInput,
    /// Unresolved managed reference or unreachable external endpoint.
    DependencyValidation,
    /// Download or checksum failure.
    ArtifactIntegrity,
    /// Manifest retrieval or credential failure.
    ApiAccess,
    /// The run was cancelled by the caller.
    Cancelled,
    /// Anything else.
    Unexpected,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::DependencyValidation => "Dependency validation failed",
            Self::ArtifactIntegrity => "Manifest or artifact failure",
            Self::ApiAccess => "API or authentication failure",
            Self::Cancelled => "Operation cancelled",
            Self::Unexpected => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Check the command arguments and the manifest contents",
            Self::DependencyValidation => {
                "Supply an endpoint with --external-endpoint or switch the dependency policy to managed"
            }
            Self::ArtifactIntegrity => "Clear the artifact cache and retry the download",
            Self::ApiAccess => "Verify the API base URI, the bearer token and the TLS settings",
            Self::Cancelled => "Re-run the operation to converge the remaining components",
            Self::Unexpected => "Check the journal and the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while planning or executing an operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request, the manifest or the dependency graph is invalid.
    #[error("{0}")]
    Validation(String),

    /// A dependency could not be resolved or reached.
    #[error("{0}")]
    DependencyValidation(String),

    /// An artifact could not be downloaded or failed verification.
    #[error("{0}")]
    ArtifactIntegrity(String),

    /// The manifest service could not be reached or rejected the request.
    #[error("{0}")]
    ApiAccess(String),

    /// Cooperative cancellation was requested.
    #[error("Operation was cancelled.")]
    Cancelled,

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A persisted document could not be encoded or decoded.
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a dependency validation error.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::DependencyValidation(message.into())
    }

    /// Create an artifact integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::ArtifactIntegrity(message.into())
    }

    /// Create an API access error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::ApiAccess(message.into())
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category used for exit classification.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::InvalidInput,
            Error::DependencyValidation(_) => ErrorCategory::DependencyValidation,
            Error::ArtifactIntegrity(_) => ErrorCategory::ArtifactIntegrity,
            Error::ApiAccess(_) => ErrorCategory::ApiAccess,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Io { .. } | Error::Json(_) | Error::Other(_) => ErrorCategory::Unexpected,
        }
    }

    /// Whether this error is a cancellation signal rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// ============================================================================
// Exit codes
// ============================================================================

/// Stable process exit classification consumed by automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    Success,
    InvalidInput,
    ApiOrAuthenticationFailure,
    ManifestOrArtifactFailure,
    DependencyValidationFailure,
    ExecutionFailureRollbackSucceeded,
    ExecutionFailureRollbackFailed,
    UnexpectedFailure,
}

impl ExitCode {
    /// Numeric process exit status.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvalidInput => 10,
            Self::ApiOrAuthenticationFailure => 20,
            Self::ManifestOrArtifactFailure => 30,
            Self::DependencyValidationFailure => 40,
            Self::ExecutionFailureRollbackSucceeded => 50,
            Self::ExecutionFailureRollbackFailed => 51,
            Self::UnexpectedFailure => 99,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        match error.category() {
            ErrorCategory::InvalidInput => Self::InvalidInput,
            ErrorCategory::DependencyValidation => Self::DependencyValidationFailure,
            ErrorCategory::ArtifactIntegrity => Self::ManifestOrArtifactFailure,
            ErrorCategory::ApiAccess => Self::ApiOrAuthenticationFailure,
            ErrorCategory::Cancelled | ErrorCategory::Unexpected => Self::UnexpectedFailure,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}
