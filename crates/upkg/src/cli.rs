use clap::{Args, Parser, Subcommand};
use miette::Report;
use std::io::{self, Write};
use std::path::PathBuf;
use upkg_core::{DEFAULT_ROOT_DIR, PackageOverrides};

use crate::tracing::LogLevel;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Install or publish failure exit code
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for SIGINT (128 + signal number 2)
pub const EXIT_SIGINT: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "upkg")]
#[command(about = "Install and publish language packages stored in OCI registries")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum,
        env = "UPKG_LOG_LEVEL"
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        value_name = "SECS",
        help = "Abort registry transfers after this many seconds",
        env = "UPKG_TIMEOUT"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "insecure-registry",
        global = true,
        value_name = "HOST",
        value_delimiter = ',',
        help = "Use plain HTTP for this registry (repeatable; localhost is always insecure)",
        env = "UPKG_INSECURE_REGISTRIES"
    )]
    pub insecure_registries: Vec<String>,
}

/// Arguments shared by `install` and `push`.
#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Artifact reference, e.g. ghcr.io/acme/lodash:4.17.21
    #[arg(value_name = "REFERENCE")]
    pub reference: String,

    #[arg(
        long = "type",
        short = 't',
        value_name = "TYPE",
        help = "Package type (e.g. npm)",
        env = "UPKG_TYPE"
    )]
    pub ecosystem: String,

    #[arg(long, help = "Package name, instead of the one inferred from the reference")]
    pub package_name: Option<String>,

    #[arg(long, help = "Package version, instead of the one inferred from the tag")]
    pub package_version: Option<String>,

    #[arg(
        long,
        help = "Project directory",
        default_value = ".",
        env = "UPKG_PROJECT_DIR"
    )]
    pub project_dir: PathBuf,
}

impl PackageArgs {
    /// Name/version overrides given on the command line.
    #[must_use]
    pub fn overrides(&self) -> PackageOverrides {
        PackageOverrides {
            name: self.package_name.clone(),
            version: self.package_version.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Pull a package and add it to the project's manifest")]
    Install {
        #[command(flatten)]
        package: PackageArgs,

        #[arg(
            long,
            help = "Directory pulled packages are stored under",
            default_value = DEFAULT_ROOT_DIR,
            env = "UPKG_ROOT_DIR"
        )]
        root_dir: PathBuf,
    },
    #[command(about = "Push a locally built package to a registry")]
    Push {
        #[command(flatten)]
        package: PackageArgs,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Render an error report to stderr.
#[allow(clippy::print_stderr)]
pub fn render_error(report: &Report) {
    eprintln!("{report:?}");
    // Ensure output is flushed before potential process exit
    let _ = io::stderr().flush();
}

/// Map an error report to an exit code.
#[must_use]
pub fn exit_code_for(report: &Report) -> i32 {
    let interrupted = report
        .downcast_ref::<upkg_core::Error>()
        .is_some_and(upkg_core::Error::is_interrupted);
    if interrupted { EXIT_SIGINT } else { EXIT_FAILURE }
}
