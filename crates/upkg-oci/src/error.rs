//! Error types for OCI transport operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for OCI transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to an OCI registry.
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials for a registry could not be read.
    #[error("Invalid registry credentials in {}: {message}", path.display())]
    AuthConfig {
        /// The config file that was read.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// The manifest has no layers to download.
    #[error("Artifact '{0}' has no layers")]
    EmptyArtifact(String),

    /// A layer title is not a plain file name.
    #[error("Refusing to write layer titled '{0}': not a plain file name")]
    UnsafeTitle(String),

    /// Failed to pull blob from registry.
    #[error("Failed to pull blob {digest}: {message}")]
    BlobPullFailed {
        /// The blob digest.
        digest: String,
        /// Error message.
        message: String,
    },

    /// Digest mismatch after download.
    #[error("Digest mismatch for blob: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The expected digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// OCI distribution error.
    #[error("OCI error: {0}")]
    Oci(String),
}

impl Error {
    /// Create an auth config error.
    #[must_use]
    pub fn auth_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AuthConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a blob pull failed error.
    #[must_use]
    pub fn blob_pull_failed(digest: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BlobPullFailed {
            digest: digest.into(),
            message: message.into(),
        }
    }

    /// Create a digest mismatch error.
    #[must_use]
    pub fn digest_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DigestMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
