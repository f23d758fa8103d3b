//! Conventional commit classification.

use crate::git::CommitInfo;

/// Semantic impact of a single commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitImpact {
    Patch,
    Minor,
    Major,
}

/// A commit message parsed as a conventional commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub sha: String,
    pub commit_type: String,
    pub scope: Option<String>,
    pub breaking: bool,
    pub description: String,
}

impl ConventionalCommit {
    /// Parses a commit, returning `None` for messages outside the convention.
    pub fn parse(commit: &CommitInfo) -> Option<Self> {
        let parsed = git_conventional::Commit::parse(commit.message.trim()).ok()?;
        Some(Self {
            sha: commit.sha.clone(),
            commit_type: parsed.type_().to_string().to_ascii_lowercase(),
            scope: parsed.scope().map(|s| s.to_string()),
            breaking: parsed.breaking(),
            description: parsed.description().to_string(),
        })
    }

    pub fn impact(&self) -> CommitImpact {
        if self.breaking {
            CommitImpact::Major
        } else if self.commit_type == "feat" {
            CommitImpact::Minor
        } else {
            CommitImpact::Patch
        }
    }
}

/// Impact of a commit; messages that do not parse count as patch-level.
pub fn classify(commit: &CommitInfo) -> CommitImpact {
    ConventionalCommit::parse(commit)
        .map(|c| c.impact())
        .unwrap_or(CommitImpact::Patch)
}

/// Highest impact across `commits`, `None` when there are no commits.
pub fn recommend(commits: &[CommitInfo]) -> Option<CommitImpact> {
    commits.iter().map(classify).max()
}
