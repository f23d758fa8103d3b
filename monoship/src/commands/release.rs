//! Versioning and publishing commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use monoship_core::change::ReferencePoint;
use monoship_core::config::MonoshipConfig;
use monoship_core::git::SystemGit;
use monoship_core::registry::CommandRegistry;
use monoship_core::release::{
    write_publish_summary, ExistingPublishOptions, PublishOptions, PublishReport, PublishSource, PublishSummaryEntry,
    ReleaseCoordinator, ReleaseOptions, ReleaseReport,
};
use monoship_core::scheduler::RunResult;
use monoship_core::version::{BumpKind, ManualBump, VersionMode};
use monoship_core::MarkdownChangelog;

use crate::formatting::{
    print_error, print_key_value, print_plan_table, print_section_header, print_status_table,
    print_success, print_summary_box, print_warning, SectionStyle,
};
use crate::{PublishArgs, VersionArgs};

use super::execution::run_succeeded;
use super::release_reporter::CliReleaseReporter;
use super::{block_on, cancel_on_interrupt, Workspace};

fn version_mode(config: &MonoshipConfig, bump: Option<&str>) -> Result<VersionMode> {
    if config.release.conventional_commits {
        if bump.is_some() {
            bail!("a bump kind cannot be combined with conventional commits");
        }
        return Ok(VersionMode::Conventional(config.conventional_options()));
    }
    let Some(bump) = bump else {
        bail!("a bump kind is required: major, minor, patch, premajor, preminor, prepatch, prerelease or a version");
    };
    let kind: BumpKind = bump.parse()?;
    Ok(VersionMode::Manual(ManualBump::Uniform(kind)))
}

fn coordinator(workspace: Workspace) -> ReleaseCoordinator {
    let changelog = MarkdownChangelog::new(workspace.config.release.changelog_header_message.clone())
        .with_authors(workspace.config.release.changelog_include_commits_git_author);
    let registry = CommandRegistry::new(workspace.config.publish.publish_command.clone());
    let git = SystemGit::new(&workspace.root);

    ReleaseCoordinator::new(workspace.root, workspace.graph, workspace.adapters, Arc::new(git))
        .with_changelog(changelog)
        .with_registry(Arc::new(registry))
        .with_reporter(CliReleaseReporter)
}

fn release_options(config: &MonoshipConfig, since: Option<&str>, bump: Option<&str>) -> Result<ReleaseOptions> {
    let mut options = ReleaseOptions::from_config(config, version_mode(config, bump)?)?;
    if let Some(since) = since {
        options.reference = ReferencePoint::Explicit(since.to_string());
    }
    Ok(options)
}

pub fn cmd_version(cwd: Option<PathBuf>, args: VersionArgs) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let options = release_options(&workspace.config, args.change.since.as_deref(), args.bump.as_deref())?;
    let cancel = cancel_on_interrupt()?;

    print_section_header(
        if options.dry_run { "Version (Dry Run)" } else { "Version" },
        SectionStyle::Primary,
    );
    let coordinator = coordinator(workspace);
    let report = block_on(coordinator.run(&options, cancel))??;
    print_report(&report);
    Ok(true)
}

pub fn cmd_publish(cwd: Option<PathBuf>, args: PublishArgs) -> Result<bool> {
    if let Some(source) = args.source() {
        return cmd_publish_existing(cwd, args, source);
    }

    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let options = release_options(
        &workspace.config,
        args.version.change.since.as_deref(),
        args.version.bump.as_deref(),
    )?
    .with_publish(&workspace.config);
    let bail = workspace.config.exec.bail;
    let summary_file = workspace.config.publish.summary_file.clone();
    let cancel = cancel_on_interrupt()?;

    print_section_header(
        if options.dry_run { "Publish (Dry Run)" } else { "Publish" },
        SectionStyle::Primary,
    );
    let coordinator = coordinator(workspace);
    let report = block_on(coordinator.run(&options, cancel))??;
    print_report(&report);

    let Some(result) = &report.publish else {
        return Ok(true);
    };
    if let Some(path) = &summary_file {
        write_summary(Path::new(path), &report.summary())?;
    }
    Ok(print_publish_result(result, bail))
}

/// Publishes what is already versioned and tagged, for finishing a release
/// whose upload failed.
fn cmd_publish_existing(cwd: Option<PathBuf>, args: PublishArgs, source: PublishSource) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let config = &workspace.config;
    let options = ExistingPublishOptions {
        source,
        tag_prefix: config.release.tag_version_prefix.clone(),
        publish: PublishOptions::from_config(config),
        dry_run: config.exec.dry_run,
    };
    let bail = config.exec.bail;
    let summary_file = config.publish.summary_file.clone();
    let cancel = cancel_on_interrupt()?;

    let title = match (source, options.dry_run) {
        (PublishSource::Git, false) => "Publish from git",
        (PublishSource::Git, true) => "Publish from git (Dry Run)",
        (PublishSource::Package, false) => "Publish from package",
        (PublishSource::Package, true) => "Publish from package (Dry Run)",
    };
    print_section_header(title, SectionStyle::Primary);
    let coordinator = coordinator(workspace);
    let report = block_on(coordinator.publish_existing(&options, cancel))??;
    print_existing_report(&report);

    let Some(result) = &report.publish else {
        return Ok(true);
    };
    if let Some(path) = &summary_file {
        write_summary(Path::new(path), &report.summary())?;
    }
    Ok(print_publish_result(result, bail))
}

fn write_summary(path: &Path, entries: &[PublishSummaryEntry]) -> Result<()> {
    let written = write_publish_summary(path, entries)?;
    print_key_value("Summary", &written.display().to_string());
    Ok(())
}

/// Prints per-package registry outcomes and returns the exit status.
fn print_publish_result(result: &RunResult, bail: bool) -> bool {
    print_section_header("Registry", SectionStyle::Primary);
    print_status_table(result);
    println!();

    let failures = result.failures();
    let cancelled = result.cancelled();
    if failures.is_empty() && cancelled.is_empty() {
        print_success(&format!("{} package(s) published", result.succeeded().len()));
        return true;
    }
    for (name, error) in &failures {
        print_error(&format!("{}: {}", name, error));
    }
    if !cancelled.is_empty() {
        print_warning(&format!("Cancelled before publishing: {}", cancelled.join(", ")));
    }
    let needs_otp = failures.iter().any(|(_, error)| {
        matches!(error, monoship_core::ExecutionError::Publish(e) if e.needs_otp())
    });
    if needs_otp {
        print_warning("Run `monoship publish --from-git --otp <code>` to publish the remaining packages");
    } else {
        print_warning("Run `monoship publish --from-git` to retry the packages that were not published");
    }
    run_succeeded(result, bail)
}

fn print_existing_report(report: &PublishReport) {
    println!();
    if report.versions.is_empty() {
        print_warning("No release found to publish");
        println!();
        return;
    }
    for name in &report.already_published {
        if let Some(version) = report.versions.get(name) {
            print_key_value("Already published", &format!("{}@{}", name, version));
        }
    }
    if report.publish.is_none() {
        print_success("Every package is already on the registry");
    }
    println!();
}

fn print_report(report: &ReleaseReport) {
    if report.plan.is_empty() {
        print_success("No changed packages to release");
        println!();
        return;
    }

    println!();
    print_plan_table(&report.plan);
    println!();

    if report.dry_run {
        print_warning("Dry run: no files were written");
        println!();
        return;
    }

    let written = report.written.len().to_string();
    let tags = report.tags.len().to_string();
    let pushed = if report.pushed { "yes" } else { "no" };
    print_summary_box(
        "Release",
        &[
            ("Packages", &report.plan.len().to_string()),
            ("Files written", &written),
            ("Tags", &tags),
            ("Pushed", pushed),
        ],
    );
    if let Some(version) = &report.plan.fixed_version {
        print_key_value("Workspace version", &version.to_string());
    }
    println!();
}
