//! Release reporter implementation for CLI.

use monoship_core::release_reporter::ReleaseReporter;
use owo_colors::OwoColorize;
use semver::Version;

use crate::formatting::Status;

/// Prints release progress as it happens.
pub struct CliReleaseReporter;

impl ReleaseReporter for CliReleaseReporter {
    fn report_bump(&self, package: &str, old: &Version, new: &Version, dry_run: bool) {
        let verb = if dry_run { "would bump" } else { "bumping" };
        println!(
            "  {} {} {} {} → {}",
            Status::Success.colored_symbol(),
            verb.bright_black(),
            package.bold().white(),
            old.to_string().bright_black(),
            new.to_string().cyan()
        );
    }

    fn report_step(&self, step: &str, detail: &str) {
        println!("  {} {} {}", Status::Success.colored_symbol(), step.bold(), detail.bright_black());
    }
}
