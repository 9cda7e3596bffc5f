//! `upkg install`

use std::path::PathBuf;
use tracing::instrument;
use upkg_core::{InstallOptions, InstallOutcome, Installer};

use super::CommandContext;
use crate::cli::PackageArgs;

/// Pull the package and wire it into the project manifest.
///
/// # Errors
///
/// Returns the failing step's error as a diagnostic report.
#[instrument(name = "install_command", skip_all, fields(reference = %package.reference))]
pub async fn execute(
    package: &PackageArgs,
    root_dir: PathBuf,
    ctx: &CommandContext,
) -> miette::Result<String> {
    let options = InstallOptions {
        ecosystem: package.ecosystem.clone(),
        overrides: package.overrides(),
        root_dir,
        project_dir: package.project_dir.clone(),
        transfer: ctx.transfer.clone(),
    };

    let outcome = Installer::new(&ctx.handlers, &ctx.client)
        .install(&package.reference, &options)
        .await?;
    Ok(summary(&outcome))
}

/// One-line summary of a completed install.
#[must_use]
pub fn summary(outcome: &InstallOutcome) -> String {
    format!(
        "Installed {}@{} from {} ({}), updated {}",
        outcome.name,
        outcome.version,
        outcome.reference,
        outcome.artifact.display(),
        outcome.manifest.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use upkg_core::PackageReference;

    #[test]
    fn test_summary() {
        let outcome = InstallOutcome {
            reference: PackageReference::parse("ghcr.io/acme/lodash:4.17.21").unwrap(),
            name: "lodash".to_string(),
            version: "4.17.21".to_string(),
            artifact: PathBuf::from(".universal-packages/acme/lodash/lodash-4.17.21.tgz"),
            manifest: PathBuf::from("package.json"),
        };

        assert_eq!(
            summary(&outcome),
            "Installed lodash@4.17.21 from ghcr.io/acme/lodash:4.17.21 \
             (.universal-packages/acme/lodash/lodash-4.17.21.tgz), updated package.json"
        );
    }
}
