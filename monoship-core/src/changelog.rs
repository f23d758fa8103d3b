//! Changelog rendering boundary.

use std::fmt::Write;

use chrono::NaiveDate;
use semver::Version;

use crate::conventional::ConventionalCommit;
use crate::git::CommitInfo;

pub const CHANGELOG_FILE: &str = "CHANGELOG.md";
const TITLE: &str = "# Changelog";

/// Everything known about one release of one package.
#[derive(Debug, Clone)]
pub struct ChangelogEntry {
    /// `None` for the workspace-level changelog in fixed mode.
    pub package: Option<String>,
    pub version: Version,
    pub date: NaiveDate,
    pub commits: Vec<CommitInfo>,
}

/// Produces changelog text for a release.
pub trait ChangelogGenerator: Send + Sync {
    /// New file contents, given the current file if there is one.
    fn render(&self, entry: &ChangelogEntry, existing: Option<&str>) -> String;
}

/// Markdown changelog grouping commits the conventional way.
#[derive(Debug, Clone, Default)]
pub struct MarkdownChangelog {
    header: Option<String>,
    include_authors: bool,
}

impl MarkdownChangelog {
    pub fn new(header: Option<String>) -> Self {
        Self {
            header,
            include_authors: false,
        }
    }

    /// Appends the commit author to each line.
    pub fn with_authors(mut self, include_authors: bool) -> Self {
        self.include_authors = include_authors;
        self
    }

    fn section(&self, entry: &ChangelogEntry) -> String {
        let mut breaking = Vec::new();
        let mut features = Vec::new();
        let mut fixes = Vec::new();

        for commit in &entry.commits {
            let Some(parsed) = ConventionalCommit::parse(commit) else {
                continue;
            };
            let mut line = format_commit(&parsed);
            if let (true, Some(author)) = (self.include_authors, &commit.author) {
                let _ = write!(line, " - {}", author);
            }
            if parsed.breaking {
                breaking.push(line.clone());
            }
            match parsed.commit_type.as_str() {
                "feat" => features.push(line),
                "fix" | "perf" | "revert" => fixes.push(line),
                _ => {}
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "## {} ({})\n", entry.version, entry.date.format("%Y-%m-%d"));

        if breaking.is_empty() && features.is_empty() && fixes.is_empty() {
            match &entry.package {
                Some(package) => {
                    let _ = writeln!(out, "**Note:** Version bump only for package {}\n", package);
                }
                None => out.push_str("**Note:** Version bump only\n\n"),
            }
            return out;
        }

        for (title, lines) in [
            ("Breaking Changes", breaking),
            ("Features", features),
            ("Bug Fixes", fixes),
        ] {
            if lines.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {}\n", title);
            for line in lines {
                let _ = writeln!(out, "{}", line);
            }
            out.push('\n');
        }
        out
    }
}

impl ChangelogGenerator for MarkdownChangelog {
    fn render(&self, entry: &ChangelogEntry, existing: Option<&str>) -> String {
        let mut body = existing.unwrap_or_default().trim_start();
        if let Some(rest) = body.strip_prefix(TITLE) {
            body = rest.trim_start();
        }
        if let Some(header) = &self.header {
            if let Some(rest) = body.strip_prefix(header.trim()) {
                body = rest.trim_start();
            }
        }

        let mut out = format!("{}\n\n", TITLE);
        if let Some(header) = &self.header {
            let _ = write!(out, "{}\n\n", header.trim());
        }
        out.push_str(&self.section(entry));
        if !body.is_empty() {
            out.push_str(body);
            if !body.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

fn format_commit(commit: &ConventionalCommit) -> String {
    let short = &commit.sha[..commit.sha.len().min(7)];
    match &commit.scope {
        Some(scope) => format!("* **{}:** {} ({})", scope, commit.description, short),
        None => format!("* {} ({})", commit.description, short),
    }
}
