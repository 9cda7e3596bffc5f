//! Publish orchestration: find a locally built artifact and push it.

use std::path::PathBuf;
use tracing::{info, instrument};

use crate::client::{RegistryClient, TransferOptions, push_artifact};
use crate::reference::{PackageOverrides, PackageReference};
use crate::registry::HandlerRegistry;
use crate::Result;

/// Settings for a single publish.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Ecosystem id the artifact belongs to.
    pub ecosystem: String,
    /// Explicit name/version taking precedence over the reference.
    pub overrides: PackageOverrides,
    /// Directory holding the built artifact.
    pub project_dir: PathBuf,
    /// Cancellation and timeout for the push.
    pub transfer: TransferOptions,
}

impl PublishOptions {
    /// Options for `ecosystem` publishing from the current directory.
    #[must_use]
    pub fn new(ecosystem: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            overrides: PackageOverrides::default(),
            project_dir: PathBuf::from("."),
            transfer: TransferOptions::default(),
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Reference the artifact was pushed to.
    pub reference: PackageReference,
    /// Local file that was pushed.
    pub artifact: PathBuf,
}

/// Pushes locally built artifacts to a registry.
pub struct Publisher<'a> {
    handlers: &'a HandlerRegistry,
    client: &'a dyn RegistryClient,
}

impl<'a> Publisher<'a> {
    /// Create a publisher over the given handlers and transport.
    #[must_use]
    pub fn new(handlers: &'a HandlerRegistry, client: &'a dyn RegistryClient) -> Self {
        Self { handlers, client }
    }

    /// Push the artifact matching `reference` from the project directory.
    ///
    /// # Errors
    ///
    /// Fails on an invalid reference, an unknown ecosystem, a missing
    /// artifact or a failed push.
    #[instrument(name = "publish", skip(self, options), fields(ecosystem = %options.ecosystem))]
    pub async fn publish(&self, reference: &str, options: &PublishOptions) -> Result<PublishOutcome> {
        let reference = PackageReference::parse(reference)?;
        let handler = self.handlers.resolve(&options.ecosystem)?;
        let (name, version) = options.overrides.resolve(&reference);

        let artifact = handler.locate_artifact(&options.project_dir, &name, &version)?;
        info!(%reference, artifact = %artifact.display(), "Pushing package");
        push_artifact(
            self.client,
            &reference,
            &artifact,
            &handler.artifact_type(),
            &options.transfer,
        )
        .await?;
        info!(%reference, "Package published");

        Ok(PublishOutcome {
            reference,
            artifact,
        })
    }
}

impl std::fmt::Debug for Publisher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("handlers", self.handlers)
            .finish_non_exhaustive()
    }
}
