// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! upkg - language-ecosystem packages as OCI artifacts
//!
//! The binary wires [`upkg_core`]'s install and publish workflows to the
//! OCI transport in [`upkg_oci`]:
//!
//! ```text
//! upkg install ghcr.io/acme/lodash:4.17.21 --type npm
//! upkg push ghcr.io/acme/lodash:4.17.21 --type npm
//! ```

pub mod cli;
pub mod commands;
pub mod tracing;
