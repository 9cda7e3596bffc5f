//! npm ecosystem handler.
//!
//! `npm pack` names tarballs `<name>-<version>.tgz`, with scoped names
//! flattened: `@scope/pkg` becomes `scope-pkg`. Installed artifacts are
//! referenced from `package.json` as `file:` dependencies.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::handler::{EcosystemHandler, existing_artifact};
use crate::manifest::{JsonManifest, find_upward, relative_slash_path};
use crate::Result;

/// Manifest file name for npm projects.
pub const PACKAGE_JSON: &str = "package.json";

const DEPENDENCIES: &str = "dependencies";

/// Handler for npm tarballs and `package.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmHandler;

impl NpmHandler {
    /// Create a new npm handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Flatten an npm package name the way `npm pack` does for file names.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.strip_prefix('@').unwrap_or(name).replace('/', "-")
}

impl EcosystemHandler for NpmHandler {
    fn id(&self) -> &'static str {
        "npm"
    }

    fn artifact_file_name(&self, name: &str, version: &str) -> String {
        format!("{}-{version}.tgz", normalize_name(name))
    }

    fn locate_artifact(&self, dir: &Path, name: &str, version: &str) -> Result<PathBuf> {
        let path = existing_artifact(dir.join(self.artifact_file_name(name, version)))?;
        debug!(package = name, version, artifact = %path.display(), "Located npm tarball");
        Ok(path)
    }

    fn update_manifest(&self, name: &str, artifact: &Path, manifest_dir: &Path) -> Result<PathBuf> {
        let manifest_path = find_upward(manifest_dir, PACKAGE_JSON)?;
        let project_dir = manifest_path.parent().unwrap_or(manifest_dir);
        let locator = format!("file:{}", relative_slash_path(project_dir, artifact)?);

        let mut manifest = JsonManifest::load(&manifest_path)?;
        if manifest.upsert(DEPENDENCIES, name, &locator)? {
            manifest.save()?;
            info!(package = name, %locator, manifest = %manifest_path.display(), "Updated dependency");
        } else {
            debug!(package = name, %locator, "Dependency already up to date");
        }
        Ok(manifest_path)
    }
}
