//! The three plan step variants.

mod install;
mod uninstall;
mod validate;

pub use install::InstallOrUpdateStep;
pub use uninstall::UninstallStep;
pub use validate::{PROBE_TIMEOUT, ValidateDependencyStep};
