//! Registry client boundary and cancellation-safe transfers.
//!
//! [`RegistryClient`] is the narrow interface to the OCI transport. The core
//! never hands a client the final working directory: [`pull_artifact`] pulls
//! into a staging directory next to it and only renames the staging
//! directory into place once the transfer finished. A cancelled, timed-out
//! or failed pull therefore leaves no files behind that a later
//! `locate_artifact` could mistake for a complete download.

use async_trait::async_trait;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::CancelReason;
use crate::reference::PackageReference;
use crate::{Error, Result};

const STAGING_PREFIX: &str = ".upkg-staging-";

/// Transport capable of moving artifact files to and from a registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Download every file of the artifact at `reference` into `dest`.
    ///
    /// `dest` is an existing, empty directory owned by the caller.
    async fn pull(&self, reference: &PackageReference, dest: &Path) -> Result<()>;

    /// Upload `artifact` as a single-file artifact tagged with the
    /// reference's version.
    async fn push(
        &self,
        reference: &PackageReference,
        artifact: &Path,
        artifact_type: &str,
    ) -> Result<()>;
}

/// Cancellation and timeout settings for a transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Token that aborts the transfer when cancelled.
    pub cancel: CancellationToken,
    /// Upper bound on the transfer duration.
    pub timeout: Option<Duration>,
}

impl TransferOptions {
    /// Options with a fresh token and no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cancel` as the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound the transfer to `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Run `transfer`, aborting it on cancellation or timeout.
async fn guarded<T>(
    reference: &PackageReference,
    options: &TransferOptions,
    transfer: impl Future<Output = Result<T>>,
) -> Result<T> {
    let bounded = async {
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, transfer)
                .await
                .map_err(|_| Error::cancelled(reference.as_str(), CancelReason::TimedOut(limit)))?,
            None => transfer.await,
        }
    };

    tokio::select! {
        biased;
        () = options.cancel.cancelled() => Err(Error::cancelled(
            reference.as_str(),
            CancelReason::Interrupted,
        )),
        result = bounded => result,
    }
}

/// Pull `reference` into `<root>/<repository>` and return that directory.
///
/// Any previous pull of the same repository is replaced.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when the token fires or the timeout elapses,
/// [`Error::Transfer`] on client failure and [`Error::Io`] when staging fails. In every
/// error case the working directory is left untouched.
#[instrument(skip(client, options), fields(reference = %reference))]
pub async fn pull_artifact(
    client: &dyn RegistryClient,
    reference: &PackageReference,
    root: &Path,
    options: &TransferOptions,
) -> Result<PathBuf> {
    let target = working_dir(root, &reference.repository())
        .ok_or_else(|| {
            Error::invalid_reference(reference.as_str(), "repository escapes the download root")
        })?;
    std::fs::create_dir_all(root).map_err(|e| Error::io(e, root, "creating download root"))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(|e| Error::io(e, root, "creating staging directory"))?;
    debug!(staging = %staging.path().display(), "Pulling into staging directory");

    guarded(reference, options, client.pull(reference, staging.path())).await?;

    promote(staging, &target)?;
    debug!(dir = %target.display(), "Pull complete");
    Ok(target)
}

/// `<root>/<repository>`, or `None` if `repository` would leave `root`.
fn working_dir(root: &Path, repository: &str) -> Option<PathBuf> {
    let repository = Path::new(repository);
    let mut components = repository.components().peekable();
    let contained = components.peek().is_some()
        && components.all(|component| matches!(component, Component::Normal(_)));
    contained.then(|| root.join(repository))
}

/// Replace `target` with the staged directory.
fn promote(staging: tempfile::TempDir, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(e, parent, "creating working directory"))?;
    }
    if target.exists() {
        std::fs::remove_dir_all(target)
            .map_err(|e| Error::io(e, target, "removing previous download"))?;
    }

    let staged = staging.keep();
    if let Err(e) = std::fs::rename(&staged, target) {
        if let Err(cleanup) = std::fs::remove_dir_all(&staged) {
            warn!(staging = %staged.display(), error = %cleanup, "Failed to remove staging directory");
        }
        return Err(Error::io(e, target, "moving download into place"));
    }
    Ok(())
}

/// Push `artifact` to `reference`.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when the token fires or the timeout elapses
/// and [`Error::Transfer`] on client failure.
#[instrument(skip(client, options), fields(reference = %reference, artifact = %artifact.display()))]
pub async fn push_artifact(
    client: &dyn RegistryClient,
    reference: &PackageReference,
    artifact: &Path,
    artifact_type: &str,
    options: &TransferOptions,
) -> Result<()> {
    guarded(reference, options, client.push(reference, artifact, artifact_type)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Writes one file, then waits forever.
    struct StallingClient;

    #[async_trait]
    impl RegistryClient for StallingClient {
        async fn pull(&self, _reference: &PackageReference, dest: &Path) -> Result<()> {
            std::fs::write(dest.join("pkg-1.0.0.tgz"), b"partial").unwrap();
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn push(&self, _: &PackageReference, _: &Path, _: &str) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Writes a fixed file and succeeds.
    struct WritingClient(&'static [u8]);

    #[async_trait]
    impl RegistryClient for WritingClient {
        async fn pull(&self, _reference: &PackageReference, dest: &Path) -> Result<()> {
            std::fs::write(dest.join("pkg-1.0.0.tgz"), self.0).unwrap();
            Ok(())
        }

        async fn push(&self, _: &PackageReference, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn reference() -> PackageReference {
        PackageReference::parse("localhost:5000/acme/pkg:1.0.0").unwrap()
    }

    #[tokio::test]
    async fn test_pull_promotes_into_repository_dir() {
        let root = TempDir::new().unwrap();
        let dir = pull_artifact(
            &WritingClient(b"bytes"),
            &reference(),
            root.path(),
            &TransferOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(dir, root.path().join("acme").join("pkg"));
        assert_eq!(std::fs::read(dir.join("pkg-1.0.0.tgz")).unwrap(), b"bytes");
        let leftovers: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_working_dir_stays_under_root() {
        let root = Path::new("/work/.universal-packages");
        assert_eq!(
            working_dir(root, &reference().repository()),
            Some(root.join("acme").join("pkg"))
        );
        for escaping in ["../victim", "acme/../../victim", "./pkg", "/etc", ""] {
            assert_eq!(working_dir(root, escaping), None, "{escaping} must be refused");
        }
    }

    #[tokio::test]
    async fn test_pull_replaces_previous_download() {
        let root = TempDir::new().unwrap();
        let old = root.path().join("acme").join("pkg");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("stale.tgz"), b"old").unwrap();

        let dir = pull_artifact(
            &WritingClient(b"new"),
            &reference(),
            root.path(),
            &TransferOptions::new(),
        )
        .await
        .unwrap();

        assert!(!dir.join("stale.tgz").exists());
        assert_eq!(std::fs::read(dir.join("pkg-1.0.0.tgz")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_cancelled_pull_leaves_nothing_behind() {
        let root = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let options = TransferOptions::new().with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = pull_artifact(&StallingClient, &reference(), root.path(), &options)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!root.path().join("acme").join("pkg").exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_pull_is_cancelled() {
        let root = TempDir::new().unwrap();
        let limit = Duration::from_millis(10);
        let options = TransferOptions::new().with_timeout(limit);

        let err = pull_artifact(&StallingClient, &reference(), root.path(), &options)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Cancelled { reason: CancelReason::TimedOut(elapsed), .. } if elapsed == limit
        ));
        assert!(!err.is_interrupted());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_push_fails_fast() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = TransferOptions::new().with_cancellation(cancel);

        let err = push_artifact(
            &WritingClient(b""),
            &reference(),
            Path::new("pkg-1.0.0.tgz"),
            "application/vnd.upkg.npm.package.v1",
            &options,
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
    }
}
