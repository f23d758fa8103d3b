//! Discovery and inspection commands.

use std::path::PathBuf;

use anyhow::Result;
use monoship_core::change::{ChangeDetector, ChangeReason, ReferencePoint};
use monoship_core::git::SystemGit;
use monoship_core::package::Package;
use owo_colors::OwoColorize;

use crate::formatting::{
    print_key_value, print_package_table, print_section_header, print_success, SectionStyle,
};
use crate::{ChangeArgs, ListArgs};

use super::Workspace;

pub fn cmd_list(cwd: Option<PathBuf>, args: ListArgs) -> Result<bool> {
    let workspace = Workspace::load(cwd, |_| {})?;
    let names: Vec<String> = if args.toposort {
        workspace.graph.topological_order().to_vec()
    } else {
        workspace.graph.packages().map(|p| p.name.clone()).collect()
    };
    let packages: Vec<&Package> = names
        .iter()
        .filter_map(|name| workspace.graph.package(name))
        .filter(|p| args.all || !p.private)
        .collect();

    if args.graph {
        let mut adjacency = serde_json::Map::new();
        for package in &packages {
            let deps = workspace.graph.dependencies_of(&package.name)?;
            adjacency.insert(package.name.clone(), serde_json::json!(deps));
        }
        println!("{}", serde_json::to_string_pretty(&adjacency)?);
        return Ok(true);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(true);
    }

    if args.ndjson {
        for package in &packages {
            println!("{}", serde_json::to_string(package)?);
        }
        return Ok(true);
    }

    if args.parseable {
        for package in &packages {
            println!("{}", parseable_line(package, args.long));
        }
        return Ok(true);
    }

    print_section_header("Packages", SectionStyle::Primary);
    if packages.is_empty() {
        println!("  {} No packages found", "WARNING:".yellow());
    } else {
        print_package_table(&packages, args.long);
        for cycle in workspace.graph.cycles() {
            println!(
                "  {} cycle tolerated: {}",
                "WARNING:".yellow(),
                cycle.join(" -> ").bright_black()
            );
        }
    }
    println!();
    Ok(true)
}

/// `location`, or `location:name:version[:PRIVATE]` when `long`.
fn parseable_line(package: &Package, long: bool) -> String {
    let location = package.location.display().to_string();
    if !long {
        return location;
    }
    let mut line = format!("{}:{}:{}", location, package.name, package.version);
    if package.private {
        line.push_str(":PRIVATE");
    }
    line
}

pub fn cmd_changed(cwd: Option<PathBuf>, args: ChangeArgs, json: bool) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let git = SystemGit::new(&workspace.root);
    let reference = match &args.since {
        Some(since) => ReferencePoint::Explicit(since.clone()),
        None => ReferencePoint::LastTag,
    };

    let changes = ChangeDetector::detect(
        &workspace.graph,
        &git,
        workspace.root(),
        &reference,
        &workspace.config.change_options(),
    )?;

    if json {
        let entries: Vec<serde_json::Value> = changes
            .packages
            .iter()
            .filter_map(|(name, changed)| {
                let package = workspace.graph.package(name)?;
                Some(serde_json::json!({
                    "name": name,
                    "version": package.version.to_string(),
                    "location": package.location,
                    "private": package.private,
                    "change": changed.reason,
                }))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(true);
    }

    print_section_header("Changed Packages", SectionStyle::Primary);
    print_key_value(
        "Since",
        changes.reference.as_deref().unwrap_or("(no previous release)"),
    );
    println!();

    if changes.is_empty() {
        print_success("No changed packages");
    } else {
        for (name, changed) in &changes.packages {
            let reason = match &changed.reason {
                ChangeReason::Diff { files } => format!("{} file(s) changed", files.len()),
                ChangeReason::Propagated { from } => format!("depends on {}", from),
                ChangeReason::Forced => "forced".to_string(),
                ChangeReason::Graduate => "graduating".to_string(),
                ChangeReason::NoPriorRelease => "never released".to_string(),
            };
            println!("  {} {} {}", "→".cyan(), name.bold().white(), reason.bright_black());
        }
    }
    println!();
    Ok(true)
}

pub fn cmd_diff(cwd: Option<PathBuf>, package: Option<String>, since: Option<String>) -> Result<bool> {
    let workspace = Workspace::load(cwd, |_| {})?;
    let git = SystemGit::new(&workspace.root);
    let reference = match since {
        Some(since) => ReferencePoint::Explicit(since),
        None => ReferencePoint::LastTag,
    };

    let patch = ChangeDetector::diff(
        &workspace.graph,
        &git,
        &reference,
        package.as_deref(),
        &workspace.config.change_options(),
    )?;
    if patch.is_empty() {
        print_success("No changes");
        return Ok(true);
    }
    for line in patch.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{}", line);
        }
    }
    Ok(true)
}
