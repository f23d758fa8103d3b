//! Dependency range parsing and rewriting.
//!
//! npm ranges are translated into `semver::VersionReq` alternatives so both
//! manifest formats share one matcher. Cargo ranges are parsed as-is.

use semver::{Version, VersionReq};

use crate::error::VersionError;
use crate::package::ManifestKind;

const WORKSPACE_PROTOCOL: &str = "workspace:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Caret,
    Tilde,
    Exact,
    /// A bare version. Exact for npm, caret for Cargo.
    Bare,
    /// Comparator sets, wildcards and alternatives are never rewritten.
    Complex,
}

/// A parsed dependency range.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    syntax: ManifestKind,
    workspace: bool,
    /// `workspace:*`, `workspace:^`, `file:` and similar always resolve locally.
    local_alias: bool,
    operator: Operator,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(raw: &str, syntax: ManifestKind) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        let (workspace, body) = match trimmed.strip_prefix(WORKSPACE_PROTOCOL) {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };

        let local_alias = (workspace && matches!(body, "*" | "^" | "~" | ""))
            || body.starts_with("file:")
            || body.starts_with("link:");
        if local_alias {
            return Ok(Self {
                raw: raw.to_string(),
                syntax,
                workspace,
                local_alias: true,
                operator: Operator::Complex,
                alternatives: Vec::new(),
            });
        }

        let alternatives = match syntax {
            ManifestKind::Npm => parse_npm(body)?,
            ManifestKind::Cargo => vec![VersionReq::parse(body).map_err(|e| invalid(raw, e))?],
        };

        Ok(Self {
            raw: raw.to_string(),
            syntax,
            workspace,
            local_alias: false,
            operator: detect_operator(body),
            alternatives,
        })
    }

    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the range uses a protocol that always points into the workspace.
    #[inline]
    pub fn is_local_protocol(&self) -> bool {
        self.workspace || self.local_alias
    }

    /// True for comparator ranges such as `>=1.0.0 <2.0.0`.
    #[inline]
    pub fn is_complex(&self) -> bool {
        !self.local_alias && self.operator == Operator::Complex
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.local_alias || self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Rewrites the range to point at `version`, keeping its operator style.
    ///
    /// Returns `None` when the range is left as written: local aliases and
    /// comparator ranges are never rewritten.
    pub fn rewrite(&self, version: &Version, exact: bool) -> Option<String> {
        if self.local_alias || self.operator == Operator::Complex {
            return None;
        }

        let operator = if exact {
            match self.syntax {
                ManifestKind::Npm => "",
                ManifestKind::Cargo => "=",
            }
        } else {
            match self.operator {
                Operator::Caret => "^",
                Operator::Tilde => "~",
                Operator::Exact => "=",
                Operator::Bare | Operator::Complex => "",
            }
        };

        let prefix = if self.workspace { WORKSPACE_PROTOCOL } else { "" };
        Some(format!("{prefix}{operator}{version}"))
    }
}

fn invalid(raw: &str, error: impl std::fmt::Display) -> VersionError {
    VersionError::InvalidRange {
        range: raw.to_string(),
        message: error.to_string(),
    }
}

fn detect_operator(body: &str) -> Operator {
    let single = !body.contains("||") && !body.contains(',') && body.split_whitespace().count() == 1;
    if !single || has_wildcard(body) {
        return Operator::Complex;
    }
    match body.chars().next() {
        Some('^') => Operator::Caret,
        Some('~') => Operator::Tilde,
        Some('=') => Operator::Exact,
        Some(c) if c.is_ascii_digit() || c == 'v' => Operator::Bare,
        _ => Operator::Complex,
    }
}

fn parse_npm(body: &str) -> Result<Vec<VersionReq>, VersionError> {
    body.split("||")
        .map(|alternative| {
            let translated = translate_npm_set(alternative.trim());
            VersionReq::parse(&translated).map_err(|e| invalid(body, e))
        })
        .collect()
}

/// Turns one npm comparator set into Cargo requirement syntax.
fn translate_npm_set(set: &str) -> String {
    if set.is_empty() || set == "*" || set.eq_ignore_ascii_case("x") || set == "latest" {
        return "*".to_string();
    }

    if let Some((low, high)) = set.split_once(" - ") {
        return format!(">={}, <={}", normalize_version(low.trim()), normalize_version(high.trim()));
    }

    let mut comparators = Vec::new();
    let mut pending_operator: Option<&str> = None;
    for token in set.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_operator = Some(token);
            continue;
        }
        let token = match pending_operator.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.push(translate_npm_comparator(&token));
    }
    comparators.join(", ")
}

fn translate_npm_comparator(token: &str) -> String {
    let split = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
        .unwrap_or(token.len());
    let (operator, version) = token.split_at(split);
    let version = normalize_version(version);
    match operator {
        "" if has_wildcard(&version) => version,
        "" => format!("={version}"),
        _ => format!("{operator}{version}"),
    }
}

/// Wildcards only count in the numeric core, so `1.0.0-next.1` stays exact.
fn has_wildcard(version: &str) -> bool {
    version
        .split(['-', '+'])
        .next()
        .unwrap_or(version)
        .contains(['*', 'x', 'X'])
}

fn normalize_version(version: &str) -> String {
    version.strip_prefix('v').unwrap_or(version).to_string()
}
