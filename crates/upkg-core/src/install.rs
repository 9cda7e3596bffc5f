//! Install orchestration: pull an artifact and wire it into the project.

use std::path::PathBuf;
use tracing::{info, instrument};

use crate::client::{RegistryClient, TransferOptions, pull_artifact};
use crate::reference::{PackageOverrides, PackageReference};
use crate::registry::HandlerRegistry;
use crate::Result;

/// Directory pulled artifacts are stored under when none is configured.
pub const DEFAULT_ROOT_DIR: &str = ".universal-packages";

/// Settings for a single install.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Ecosystem id the artifact belongs to (e.g. `"npm"`).
    pub ecosystem: String,
    /// Explicit name/version taking precedence over the reference.
    pub overrides: PackageOverrides,
    /// Root that pulled repositories are placed under.
    pub root_dir: PathBuf,
    /// Directory the manifest search starts from.
    pub project_dir: PathBuf,
    /// Cancellation and timeout for the pull.
    pub transfer: TransferOptions,
}

impl InstallOptions {
    /// Options for `ecosystem` with default directories.
    #[must_use]
    pub fn new(ecosystem: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            overrides: PackageOverrides::default(),
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            project_dir: PathBuf::from("."),
            transfer: TransferOptions::default(),
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// The parsed reference that was pulled.
    pub reference: PackageReference,
    /// Effective package name.
    pub name: String,
    /// Effective package version.
    pub version: String,
    /// Location of the pulled artifact.
    pub artifact: PathBuf,
    /// Manifest that now depends on the artifact.
    pub manifest: PathBuf,
}

/// Pulls artifacts and records them in the project's manifest.
pub struct Installer<'a> {
    handlers: &'a HandlerRegistry,
    client: &'a dyn RegistryClient,
}

impl<'a> Installer<'a> {
    /// Create an installer over the given handlers and transport.
    #[must_use]
    pub fn new(handlers: &'a HandlerRegistry, client: &'a dyn RegistryClient) -> Self {
        Self { handlers, client }
    }

    /// Install the artifact at `reference`.
    ///
    /// The manifest is only written once the artifact is on disk; any
    /// earlier failure leaves the project untouched.
    ///
    /// # Errors
    ///
    /// Fails with the error of whichever step failed first: reference
    /// parsing, handler lookup, the pull, artifact lookup or the manifest
    /// update.
    #[instrument(name = "install", skip(self, options), fields(ecosystem = %options.ecosystem))]
    pub async fn install(&self, reference: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let reference = PackageReference::parse(reference)?;
        let handler = self.handlers.resolve(&options.ecosystem)?;
        let (name, version) = options.overrides.resolve(&reference);

        info!(%reference, package = %name, %version, "Pulling package");
        let dir = pull_artifact(self.client, &reference, &options.root_dir, &options.transfer).await?;
        let artifact = handler.locate_artifact(&dir, &name, &version)?;
        let manifest = handler.update_manifest(&name, &artifact, &options.project_dir)?;
        info!(artifact = %artifact.display(), manifest = %manifest.display(), "Package installed");

        Ok(InstallOutcome {
            reference,
            name,
            version,
            artifact,
            manifest,
        })
    }
}

impl std::fmt::Debug for Installer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("handlers", self.handlers)
            .finish_non_exhaustive()
    }
}
