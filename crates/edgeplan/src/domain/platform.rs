//! Target platform used to pick artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system and CPU architecture in manifest naming.
///
/// OS names are `linux` and `windows`. Architectures are `x64`, `arm64`,
/// `x86` and `arm`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)
    }
}
