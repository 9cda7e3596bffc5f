//! Ecosystem handler capability.
//!
//! An [`EcosystemHandler`] knows how one package ecosystem names its artifact
//! files and how to point that ecosystem's manifest at a local artifact.
//! Handlers are registered in a [`HandlerRegistry`](crate::HandlerRegistry)
//! under their [`id`](EcosystemHandler::id); orchestration code never
//! branches on the ecosystem itself.
//!
//! # Example
//!
//! ```ignore
//! use upkg_core::{EcosystemHandler, Result};
//!
//! struct PipHandler;
//!
//! impl EcosystemHandler for PipHandler {
//!     fn id(&self) -> &'static str { "pip" }
//!     fn artifact_file_name(&self, name: &str, version: &str) -> String {
//!         format!("{name}-{version}.tar.gz")
//!     }
//!     // locate_artifact / update_manifest ...
//! }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::{Error, Result};

/// Per-ecosystem knowledge of artifact naming and manifest patching.
pub trait EcosystemHandler: Send + Sync {
    /// Identifier the handler is registered under (e.g. `"npm"`).
    fn id(&self) -> &'static str;

    /// File name the ecosystem's tooling gives the artifact for
    /// `(name, version)`.
    fn artifact_file_name(&self, name: &str, version: &str) -> String;

    /// OCI artifact type used when publishing this ecosystem's packages.
    fn artifact_type(&self) -> String {
        format!("application/vnd.upkg.{}.package.v1", self.id())
    }

    /// Find the artifact for `(name, version)` directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotFound`] when no such file exists and
    /// [`Error::Io`] on other filesystem errors.
    fn locate_artifact(&self, dir: &Path, name: &str, version: &str) -> Result<PathBuf>;

    /// Point the nearest manifest above `manifest_dir` at `artifact`.
    ///
    /// Returns the path of the manifest that was updated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestNotFound`] when no manifest exists,
    /// [`Error::InvalidManifest`] when it cannot be patched and
    /// [`Error::ManifestWrite`] when persisting fails.
    fn update_manifest(&self, name: &str, artifact: &Path, manifest_dir: &Path) -> Result<PathBuf>;
}

/// Check that `path` is an existing regular file.
///
/// # Errors
///
/// Returns [`Error::ArtifactNotFound`] when it is missing or not a file.
pub fn existing_artifact(path: PathBuf) -> Result<PathBuf> {
    trace!(?path, "Checking for artifact");
    match std::fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => Ok(path),
        Ok(_) => Err(Error::ArtifactNotFound { path }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ArtifactNotFound { path }),
        Err(e) => Err(Error::io(e, path, "checking package file")),
    }
}
