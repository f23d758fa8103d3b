//! Git boundary.
//!
//! The engine decides which git operations happen and in what order; this
//! module only carries them out. Reads go through libgit2, writes through the
//! `git` binary so hooks, signing and credential helpers behave as the user
//! configured them.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{
    DescribeFormatOptions, DescribeOptions, DiffFormat, DiffOptions, ErrorClass, ErrorCode, Repository, Sort,
};
use tracing::debug;

use crate::error::{ChangeDetectionError, GitCommandError, Result};

/// A commit attributed to a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
}

impl CommitInfo {
    pub fn new(sha: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub sign: bool,
    pub signoff: bool,
    /// Pass `--no-verify`, skipping commit hooks.
    pub no_verify: bool,
    pub amend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOptions {
    pub sign: bool,
    pub force: bool,
    /// Replacement for `git tag`, with `%s` placeholders for tag and message.
    pub command: Option<String>,
}

/// Operations the engine issues against the repository.
pub trait GitClient: Send + Sync {
    /// Sha of `HEAD`.
    fn head_sha(&self) -> Result<String>;

    /// Current branch, `None` when detached.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Most recent tag matching `pattern` reachable from `HEAD`.
    ///
    /// Only first-parent history is considered unless `include_merged`.
    fn last_tag(&self, pattern: &str, include_merged: bool) -> Result<Option<String>>;

    /// Resolves a ref to a commit sha.
    fn resolve(&self, reference: &str) -> Result<String>;

    /// Absolute paths of files that differ between `since` and the working tree.
    fn changed_files(&self, since: &str) -> Result<Vec<PathBuf>>;

    /// Commits after `since` (all history when `None`) touching `location`,
    /// newest first.
    fn commits_since(&self, since: Option<&str>, location: &Path) -> Result<Vec<CommitInfo>>;

    /// Names of tags pointing at `HEAD`, sorted.
    fn tags_at_head(&self) -> Result<Vec<String>>;

    /// Patch text for `paths` between `since` (the empty tree when `None`)
    /// and the working tree.
    fn diff(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<String>;

    fn add(&self, pathspecs: &[String]) -> std::result::Result<(), GitCommandError>;

    fn commit(&self, message: &str, options: &CommitOptions) -> std::result::Result<(), GitCommandError>;

    fn tag(&self, name: &str, message: &str, options: &TagOptions) -> std::result::Result<(), GitCommandError>;

    fn push(&self, remote: &str, branch: &str) -> std::result::Result<(), GitCommandError>;
}

/// [`GitClient`] backed by the repository on disk.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: PathBuf,
}

impl SystemGit {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn open(&self) -> Result<Repository> {
        Ok(Repository::discover(&self.root)?)
    }

    fn workdir(repo: &Repository) -> Result<PathBuf> {
        repo.workdir().map(Path::to_path_buf).ok_or_else(|| {
            ChangeDetectionError::Git("repository has no working directory".to_string()).into()
        })
    }

    fn run(&self, program: &str, args: &[String]) -> std::result::Result<String, GitCommandError> {
        let command_line = display_command(program, args);
        debug!(command = %command_line, "running git");

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| GitCommandError {
                command: command_line.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GitCommandError {
                command: command_line,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl GitClient for SystemGit {
    fn head_sha(&self) -> Result<String> {
        let repo = self.open()?;
        let head = repo.head()?.peel_to_commit()?;
        Ok(head.id().to_string())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let repo = self.open()?;
        let head = repo.head()?;
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    fn last_tag(&self, pattern: &str, include_merged: bool) -> Result<Option<String>> {
        let repo = self.open()?;
        let mut options = DescribeOptions::new();
        options
            .describe_tags()
            .pattern(pattern)
            .only_follow_first_parent(!include_merged);

        let found = match repo.describe(&options) {
            Ok(describe) => {
                let mut format = DescribeFormatOptions::new();
                format.abbreviated_size(0);
                Some(describe.format(Some(&format))?)
            }
            // No matching tag at all is reported as a generic describe error.
            Err(e) if e.code() == ErrorCode::NotFound || e.class() == ErrorClass::Describe => None,
            Err(e) => return Err(e.into()),
        };
        Ok(found)
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        let repo = self.open()?;
        let commit = repo
            .revparse_single(reference)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| ChangeDetectionError::UnresolvedReference {
                reference: reference.to_string(),
                message: e.message().to_string(),
            })?;
        Ok(commit.id().to_string())
    }

    fn changed_files(&self, since: &str) -> Result<Vec<PathBuf>> {
        let repo = self.open()?;
        let workdir = Self::workdir(&repo)?;
        let tree = repo
            .revparse_single(since)
            .and_then(|obj| obj.peel_to_tree())
            .map_err(|e| ChangeDetectionError::UnresolvedReference {
                reference: since.to_string(),
                message: e.message().to_string(),
            })?;

        let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), None)?;
        let mut files = Vec::new();
        for delta in diff.deltas() {
            for path in [delta.old_file().path(), delta.new_file().path()].into_iter().flatten() {
                let absolute = workdir.join(path);
                if !files.contains(&absolute) {
                    files.push(absolute);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn commits_since(&self, since: Option<&str>, location: &Path) -> Result<Vec<CommitInfo>> {
        let repo = self.open()?;
        let workdir = Self::workdir(&repo)?;
        let pathspec = crate::scanner::relative_location(&workdir, location);

        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        walk.push_head()?;
        if let Some(since) = since {
            let boundary = repo.revparse_single(since)?.peel_to_commit()?;
            walk.hide(boundary.id())?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let parent_tree = if commit.parent_count() > 0 {
                Some(commit.parent(0)?.tree()?)
            } else {
                None
            };

            let mut options = DiffOptions::new();
            if !pathspec.is_empty() {
                options.pathspec(pathspec.as_str());
            }
            let diff = repo.diff_tree_to_tree(
                parent_tree.as_ref(),
                Some(&commit.tree()?),
                Some(&mut options),
            )?;

            if diff.deltas().len() > 0 {
                commits.push(CommitInfo {
                    sha: commit.id().to_string(),
                    message: commit.message().unwrap_or_default().to_string(),
                    author: commit.author().name().map(str::to_string),
                });
            }
        }

        Ok(commits)
    }

    fn tags_at_head(&self) -> Result<Vec<String>> {
        let repo = self.open()?;
        let head = repo.head()?.peel_to_commit()?.id();
        let names = repo.tag_names(None)?;

        let mut tags = Vec::new();
        for name in names.iter().flatten() {
            let target = repo
                .revparse_single(&format!("refs/tags/{}", name))
                .and_then(|obj| obj.peel_to_commit());
            if matches!(target, Ok(commit) if commit.id() == head) {
                tags.push(name.to_string());
            }
        }
        tags.sort();
        Ok(tags)
    }

    fn diff(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<String> {
        let repo = self.open()?;
        let workdir = Self::workdir(&repo)?;
        let tree = match since {
            Some(since) => Some(
                repo.revparse_single(since)
                    .and_then(|obj| obj.peel_to_tree())
                    .map_err(|e| ChangeDetectionError::UnresolvedReference {
                        reference: since.to_string(),
                        message: e.message().to_string(),
                    })?,
            ),
            None => None,
        };

        let mut options = DiffOptions::new();
        for path in paths {
            let pathspec = crate::scanner::relative_location(&workdir, path);
            if !pathspec.is_empty() {
                options.pathspec(pathspec);
            }
        }
        let diff = repo.diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut options))?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_, _, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(patch)
    }

    fn add(&self, pathspecs: &[String]) -> std::result::Result<(), GitCommandError> {
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(pathspecs.iter().cloned());
        self.run("git", &args).map(|_| ())
    }

    fn commit(&self, message: &str, options: &CommitOptions) -> std::result::Result<(), GitCommandError> {
        let mut args = vec!["commit".to_string()];
        if options.sign {
            args.push("--gpg-sign".to_string());
        }
        if options.signoff {
            args.push("--signoff".to_string());
        }
        if options.no_verify {
            args.push("--no-verify".to_string());
        }
        if options.amend {
            args.push("--amend".to_string());
        }
        args.push("-m".to_string());
        args.push(message.to_string());
        self.run("git", &args).map(|_| ())
    }

    fn tag(&self, name: &str, message: &str, options: &TagOptions) -> std::result::Result<(), GitCommandError> {
        if let Some(template) = &options.command {
            let (program, args) = expand_tag_command(template, name, message);
            return self.run(&program, &args).map(|_| ());
        }

        let mut args = vec!["tag".to_string(), name.to_string(), "-m".to_string(), message.to_string()];
        args.push(if options.sign { "--sign" } else { "--annotate" }.to_string());
        if options.force {
            args.push("--force".to_string());
        }
        self.run("git", &args).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str) -> std::result::Result<(), GitCommandError> {
        let args: Vec<String> = ["push", "--follow-tags", "--no-verify", "--atomic", remote, branch]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.run("git", &args).map(|_| ())
    }
}

/// Expands a custom tag command such as `git gh-tag %s -m %s`.
///
/// The first `%s` becomes the tag name, the second the message.
pub fn expand_tag_command(template: &str, tag: &str, message: &str) -> (String, Vec<String>) {
    let mut substitutions = [tag, message].into_iter();
    let mut tokens = template.split_whitespace().map(|token| {
        if token.contains("%s") {
            token.replacen("%s", substitutions.next().unwrap_or_default(), 1)
        } else {
            token.to_string()
        }
    });
    let program = tokens.next().unwrap_or_else(|| "git".to_string());
    (program, tokens.collect())
}

/// Renders a command line with arguments quoted where needed.
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                format!("\"{}\"", arg.replace('"', "\\\""))
            } else {
                arg.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One commit touching `packages/pkg-a`, tagged `v1.0.0` and `pkg-a@1.0.0`.
    fn released_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("packages/pkg-a")).unwrap();
        std::fs::write(dir.path().join("packages/pkg-a/index.js"), "one\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("packages/pkg-a/index.js")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = git2::Signature::now("Release Bot", "release@example.com").unwrap();
        let commit = repo
            .commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
            .unwrap();
        let object = repo.find_object(commit, None).unwrap();
        repo.tag("v1.0.0", &object, &signature, "v1.0.0", false).unwrap();
        repo.tag_lightweight("pkg-a@1.0.0", &object, false).unwrap();
        dir
    }

    #[test]
    fn reads_release_tags_at_head() {
        let dir = released_repo();
        let git = SystemGit::new(dir.path());

        assert_eq!(git.last_tag("v*", false).unwrap().as_deref(), Some("v1.0.0"));
        assert_eq!(git.last_tag("nothing-*", false).unwrap(), None);
        assert_eq!(git.tags_at_head().unwrap(), vec!["pkg-a@1.0.0", "v1.0.0"]);
    }

    #[test]
    fn diff_is_limited_to_the_given_paths() {
        let dir = released_repo();
        std::fs::write(dir.path().join("packages/pkg-a/index.js"), "two\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "root\n").unwrap();
        let git = SystemGit::new(dir.path());
        let package = dir.path().join("packages/pkg-a");

        let patch = git.diff(Some("v1.0.0"), &[package.clone()]).unwrap();
        assert!(patch.contains("-one"));
        assert!(patch.contains("+two"));
        assert!(!patch.contains("README"));

        let unknown = git.diff(Some("v9.9.9"), &[package]);
        assert!(unknown.is_err());
    }

    #[test]
    fn custom_tag_command_substitutes_in_order() {
        let (program, args) = expand_tag_command("git gh-tag %s -m %s", "v1.0.0", "v1.0.0");
        assert_eq!(program, "git");
        assert_eq!(args, vec!["gh-tag", "v1.0.0", "-m", "v1.0.0"]);
    }

    #[test]
    fn display_command_quotes_messages() {
        let rendered = display_command(
            "git",
            &["commit".to_string(), "-m".to_string(), "chore: publish".to_string()],
        );
        assert_eq!(rendered, "git commit -m \"chore: publish\"");
    }
}
