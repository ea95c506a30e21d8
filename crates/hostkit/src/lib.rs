//! # hostkit
//!
//! Host-side implementations of the `edgeplan` collaborator traits.
//!
//! - [`JsonStateStore`]: state snapshot as JSON, journal as JSON lines
//! - [`HttpManifestClient`] and [`HttpArtifactDownloader`] over `ureq`
//! - [`Sha256Verifier`] for downloaded artifacts
//! - [`SystemdServiceManager`] and [`WindowsServiceManager`]
//! - [`CommandProcessRunner`] around `std::process::Command`
//!
//! ## Example
//!
//! ```no_run
//! use edgeplan::backend::StateStore;
//! use hostkit::JsonStateStore;
//! use std::path::Path;
//!
//! let store = JsonStateStore::new();
//! let state = store.load(Path::new("/var/lib/edgeward/state.json")).unwrap();
//! println!("{} component(s) installed", state.components.len());
//! ```

pub mod checksum;
pub mod http;
pub mod platform;
pub mod process;
pub mod services;
pub mod store;

pub use checksum::Sha256Verifier;
pub use http::{HttpArtifactDownloader, HttpManifestClient};
pub use process::CommandProcessRunner;
pub use services::{SystemdServiceManager, WindowsServiceManager, default_service_manager};
pub use store::JsonStateStore;
