//! Command execution for the upkg CLI.

pub mod install;
pub mod push;

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use upkg_core::{HandlerRegistry, TransferOptions};
use upkg_oci::OciRegistryClient;

use crate::cli::{Cli, Commands};

/// Everything a command needs to run.
#[derive(Debug)]
pub struct CommandContext {
    /// Ecosystem handlers available to this invocation.
    pub handlers: HandlerRegistry,
    /// Registry transport.
    pub client: OciRegistryClient,
    /// Cancellation and timeout for transfers.
    pub transfer: TransferOptions,
}

impl CommandContext {
    /// Build the context for `cli`, cancelled through `cancel`.
    #[must_use]
    pub fn from_cli(cli: &Cli, cancel: CancellationToken) -> Self {
        let mut transfer = TransferOptions::new().with_cancellation(cancel);
        if let Some(secs) = cli.timeout {
            transfer = transfer.with_timeout(Duration::from_secs(secs));
        }
        Self {
            handlers: HandlerRegistry::with_defaults(),
            client: OciRegistryClient::new()
                .with_insecure_registries(cli.insecure_registries.iter().cloned()),
            transfer,
        }
    }
}

/// Run the selected subcommand and return the line to print on success.
///
/// # Errors
///
/// Returns the failing step's error as a diagnostic report.
pub async fn execute(command: Commands, ctx: &CommandContext) -> miette::Result<String> {
    match command {
        Commands::Install { package, root_dir } => install::execute(&package, root_dir, ctx).await,
        Commands::Push { package } => push::execute(&package, ctx).await,
    }
}
