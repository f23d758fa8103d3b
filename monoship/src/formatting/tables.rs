//! Table formatting utilities using comfy-table.

use comfy_table::{Cell, Color, Table};
use monoship_core::package::Package;
use monoship_core::scheduler::{PackageStatus, RunResult, SkipReason};
use monoship_core::version::{BumpKind, BumpReason, VersionBumpPlan};

use super::{format_duration, Status};

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(comfy_table::Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

/// Prints a table of packages with their versions, and locations when `long`.
pub fn print_package_table(packages: &[&Package], long: bool) {
    let headers: &[&str] = if long {
        &["Package", "Version", "Location", ""]
    } else {
        &["Package", "Version", ""]
    };
    let mut table = styled_table(headers);
    for package in packages {
        let mut row = vec![
            Cell::new(&package.name).fg(Color::White),
            Cell::new(package.version.to_string()).fg(Color::Cyan),
        ];
        if long {
            row.push(Cell::new(&package.relative_location).fg(Color::DarkGrey));
        }
        row.push(Cell::new(if package.private { "private" } else { "" }).fg(Color::Yellow));
        table.add_row(row);
    }
    println!("{}", table);
}

/// Prints planned version changes.
pub fn print_plan_table(plan: &VersionBumpPlan) {
    let mut table = styled_table(&["Bump", "Package", "Version", "Reason"]);
    for (name, bump) in plan.iter() {
        let color = match bump.kind {
            BumpKind::Major | BumpKind::PreMajor => Color::Red,
            BumpKind::Minor | BumpKind::PreMinor => Color::Yellow,
            _ => Color::Green,
        };
        let reason = match &bump.reason {
            BumpReason::Requested => "requested".to_string(),
            BumpReason::Commits => "commits".to_string(),
            BumpReason::Graduate => "graduate".to_string(),
            BumpReason::Propagated { from } => format!("depends on {}", from),
            BumpReason::DependencyRange { dependency } => format!("range on {}", dependency),
        };
        table.add_row(vec![
            Cell::new(bump.kind.to_string().to_uppercase()).fg(color),
            Cell::new(name).fg(Color::White),
            Cell::new(format!("{} → {}", bump.current, bump.next)).fg(Color::Cyan),
            Cell::new(reason).fg(Color::DarkGrey),
        ]);
    }
    println!("{}", table);
}

/// Prints one row per package of a run: started packages first, in start
/// order, then the ones never started.
pub fn print_status_table(result: &RunResult) {
    let mut table = styled_table(&["Status", "Package", "Duration", "Details"]);
    let never_started = result.outcomes.keys().filter(|name| !result.order.contains(name));
    for name in result.order.iter().chain(never_started) {
        let Some(status) = result.outcomes.get(name) else {
            continue;
        };
        let (symbol, color, details) = match status {
            PackageStatus::Success => (Status::Success.symbol(), Color::Green, String::new()),
            PackageStatus::Failed(error) => (Status::Error.symbol(), Color::Red, error.to_string()),
            PackageStatus::Skipped(reason) => (
                Status::Warning.symbol(),
                Color::Yellow,
                match reason {
                    SkipReason::DependencyFailed(dep) => format!("{} did not succeed", dep),
                    SkipReason::Bailed => "not started after a failure".to_string(),
                    SkipReason::DryRun => "dry run".to_string(),
                },
            ),
            PackageStatus::Cancelled => (Status::Warning.symbol(), Color::Yellow, "cancelled".to_string()),
        };
        let duration = result
            .durations
            .get(name)
            .map(|d| format_duration(d.as_secs_f64()))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(symbol).fg(color),
            Cell::new(name).fg(Color::White),
            Cell::new(duration).fg(Color::DarkGrey),
            Cell::new(details).fg(color),
        ]);
    }
    println!("{}", table);
}
