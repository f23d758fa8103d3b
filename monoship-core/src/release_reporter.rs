//! Trait for reporting release progress.

use semver::Version;

/// Receives release progress so the core never writes to stdout itself.
pub trait ReleaseReporter: Send + Sync {
    /// A planned version change.
    fn report_bump(&self, package: &str, old: &Version, new: &Version, dry_run: bool);

    /// A finished release step, such as a commit or a tag.
    fn report_step(&self, step: &str, detail: &str) {
        let _ = (step, detail);
    }
}

/// Reporter that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ReleaseReporter for SilentReporter {
    fn report_bump(&self, _package: &str, _old: &Version, _new: &Version, _dry_run: bool) {}
}
