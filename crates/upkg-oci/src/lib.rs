//! OCI registry transport for universal packages.
//!
//! [`OciRegistryClient`] implements [`upkg_core::RegistryClient`] on top of
//! `oci-distribution`. Artifacts are pushed as OCI image manifests with an
//! empty config and one titled layer per file, and pulled back by writing
//! each layer under its title after verifying its digest.
//!
//! # Example
//!
//! ```ignore
//! use upkg_oci::OciRegistryClient;
//!
//! let client = OciRegistryClient::new().with_insecure_registries(["registry.lan:5000"]);
//! ```

pub mod auth;
pub mod client;
pub mod error;

pub use auth::Credential;
pub use client::OciRegistryClient;
pub use error::{Error, Result};
