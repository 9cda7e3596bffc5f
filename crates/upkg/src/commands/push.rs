//! `upkg push`

use tracing::instrument;
use upkg_core::{PublishOptions, PublishOutcome, Publisher};

use super::CommandContext;
use crate::cli::PackageArgs;

/// Locate the built package in the project directory and push it.
///
/// # Errors
///
/// Returns the failing step's error as a diagnostic report.
#[instrument(name = "push_command", skip_all, fields(reference = %package.reference))]
pub async fn execute(package: &PackageArgs, ctx: &CommandContext) -> miette::Result<String> {
    let options = PublishOptions {
        ecosystem: package.ecosystem.clone(),
        overrides: package.overrides(),
        project_dir: package.project_dir.clone(),
        transfer: ctx.transfer.clone(),
    };

    let outcome = Publisher::new(&ctx.handlers, &ctx.client)
        .publish(&package.reference, &options)
        .await?;
    Ok(summary(&outcome))
}

#[must_use]
pub fn summary(outcome: &PublishOutcome) -> String {
    format!("Pushed {} to {}", outcome.artifact.display(), outcome.reference)
}
