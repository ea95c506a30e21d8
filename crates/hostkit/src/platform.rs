//! Host platform detection.
//!
//! Maps Rust's target names onto the names used in manifests.

use edgeplan::domain::Platform;

/// Manifest OS name for a Rust `target_os` value.
#[must_use]
pub fn os_name(os: &str) -> &str {
    match os {
        "linux" => "linux",
        "windows" => "windows",
        other => other,
    }
}

/// Manifest architecture name for a Rust `target_arch` value.
///
/// | Rust      | Manifest |
/// |-----------|----------|
/// | `x86_64`  | `x64`    |
/// | `aarch64` | `arm64`  |
/// | `x86`     | `x86`    |
/// | `arm`     | `arm`    |
#[must_use]
pub fn architecture_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" | "i686" => "x86",
        "arm" => "arm",
        other => other,
    }
}

/// Platform of the running host.
///
/// Unknown OS or architecture names pass through unchanged; they simply
/// match no artifact.
#[must_use]
pub fn detect() -> Platform {
    Platform::new(
        os_name(std::env::consts::OS),
        architecture_name(std::env::consts::ARCH),
    )
}
