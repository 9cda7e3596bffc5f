//! Error types for install and publish operations.

use miette::Diagnostic;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a transfer was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Interrupted,
    /// The transfer ran past its time limit.
    TimedOut(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("interrupted"),
            Self::TimedOut(limit) => write!(f, "timed out after {limit:?}"),
        }
    }
}

/// Result type for universal package operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, installing or publishing a package.
///
/// Every variant is terminal for the current invocation and carries the
/// reference, path or ecosystem that caused it.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The artifact reference could not be parsed.
    #[error("Invalid package reference '{reference}': {reason}")]
    #[diagnostic(
        code(upkg::reference::invalid),
        help("References look like 'registry[:port]/[org/]repo[:tag]', e.g. 'ghcr.io/acme/lodash:4.17.21'")
    )]
    InvalidReference {
        /// The reference as given.
        reference: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No handler is registered for the requested ecosystem.
    #[error("Unsupported package type '{ecosystem}' (supported: {})", available.join(", "))]
    #[diagnostic(
        code(upkg::ecosystem::unsupported),
        help("Pass one of the supported types with --type")
    )]
    UnsupportedEcosystem {
        /// The requested ecosystem id.
        ecosystem: String,
        /// Ids that are registered.
        available: Vec<String>,
    },

    /// The expected artifact file does not exist.
    #[error("Expected package file not found: {}", path.display())]
    #[diagnostic(
        code(upkg::artifact::not_found),
        help("Check the package name and version, or pass --package-name/--package-version explicitly")
    )]
    ArtifactNotFound {
        /// The path that was checked.
        path: PathBuf,
    },

    /// No manifest was found walking upward from the start directory.
    #[error("No manifest found in {} or any parent directory", start.display())]
    #[diagnostic(
        code(upkg::manifest::not_found),
        help("Run the command from inside a project that has a package.json")
    )]
    ManifestNotFound {
        /// The directory the search started from.
        start: PathBuf,
    },

    /// The manifest exists but cannot be patched.
    #[error("Invalid manifest at {}: {message}", path.display())]
    #[diagnostic(code(upkg::manifest::invalid))]
    InvalidManifest {
        /// Path to the manifest.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Persisting the patched manifest failed.
    #[error("Failed to write manifest {}: {source}", path.display())]
    #[diagnostic(
        code(upkg::manifest::write_failed),
        help("Check file permissions on the manifest and its directory")
    )]
    ManifestWrite {
        /// Path to the manifest.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The registry transfer failed.
    #[error("Transfer of '{reference}' failed: {message}")]
    #[diagnostic(code(upkg::transfer::failed))]
    Transfer {
        /// The reference being transferred.
        reference: String,
        /// Description of the failure.
        message: String,
    },

    /// The transfer was aborted through its cancellation context.
    #[error("Transfer of '{reference}' was cancelled: {reason}")]
    #[diagnostic(code(upkg::transfer::cancelled))]
    Cancelled {
        /// The reference being transferred.
        reference: String,
        /// What aborted it.
        reason: CancelReason,
    },

    /// Filesystem error outside the manifest write.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(code(upkg::io))]
    Io {
        /// Underlying error.
        #[source]
        source: std::io::Error,
        /// Path involved, if any.
        path: Option<PathBuf>,
        /// What was being done.
        operation: String,
    },
}

impl Error {
    /// Create an invalid reference error.
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported ecosystem error.
    #[must_use]
    pub fn unsupported_ecosystem(ecosystem: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnsupportedEcosystem {
            ecosystem: ecosystem.into(),
            available,
        }
    }

    /// Create an invalid manifest error.
    #[must_use]
    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a transfer error.
    #[must_use]
    pub fn transfer(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    #[must_use]
    pub fn cancelled(reference: impl Into<String>, reason: CancelReason) -> Self {
        Self::Cancelled {
            reference: reference.into(),
            reason,
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
            operation: operation.into(),
        }
    }

    /// Whether the transfer was cancelled, by the caller or by its timeout.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the caller's token fired, as opposed to a timeout.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Cancelled {
                reason: CancelReason::Interrupted,
                ..
            }
        )
    }
}
