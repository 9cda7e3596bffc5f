// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! upkg-core - language-ecosystem packages as OCI artifacts
//!
//! This crate holds everything about universal packages that does not touch
//! the network: parsing artifact references, the per-ecosystem knowledge of
//! artifact names and manifests, and the install/publish orchestration that
//! ties them to a [`RegistryClient`].
//!
//! # Architecture
//!
//! - [`PackageReference`] - parsed `registry/[org/]repo[:tag]` reference
//! - [`EcosystemHandler`] - artifact naming and manifest patching for one
//!   ecosystem ([`NpmHandler`] is built in)
//! - [`HandlerRegistry`] - ecosystem id to handler lookup
//! - [`RegistryClient`] - the transport boundary, implemented by `upkg-oci`
//! - [`Installer`] / [`Publisher`] - the two orchestrated workflows
//!
//! # Example
//!
//! ```ignore
//! use upkg_core::{HandlerRegistry, InstallOptions, Installer};
//!
//! let handlers = HandlerRegistry::with_defaults();
//! let installer = Installer::new(&handlers, &client);
//! let outcome = installer
//!     .install("ghcr.io/acme/lodash:4.17.21", &InstallOptions::new("npm"))
//!     .await?;
//! println!("installed {}", outcome.artifact.display());
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod install;
pub mod manifest;
pub mod npm;
pub mod publish;
pub mod reference;
pub mod registry;

pub use client::{RegistryClient, TransferOptions, pull_artifact, push_artifact};
pub use error::{CancelReason, Error, Result};
pub use handler::EcosystemHandler;
pub use install::{DEFAULT_ROOT_DIR, InstallOptions, InstallOutcome, Installer};
pub use npm::NpmHandler;
pub use publish::{PublishOptions, PublishOutcome, Publisher};
pub use reference::{DEFAULT_VERSION, PackageOverrides, PackageReference};
pub use registry::HandlerRegistry;
