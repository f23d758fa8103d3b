use std::fs;
use std::time::Duration;

use monoship_core::config::{write_fixed_version, CONFIG_FILE};
use monoship_core::{ConcurrencyMode, Error, GraphType, MonoshipConfig, OutputMode, Versioning};
use semver::Version;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = MonoshipConfig::parse("").unwrap();

    assert_eq!(config.packages, vec!["packages/*"]);
    assert!(config.is_independent());
    assert_eq!(config.tag_pattern(), "*@*");
    assert_eq!(config.graph_type, GraphType::All);
    assert!(config.release.push);
    assert!(config.release.git_tag_version);
    assert!(config.exec.bail);
    assert!(config.changed.propagate_dev_dependencies);
    assert_eq!(config.publish.dist_tag, "latest");
    assert_eq!(config.quiet_period(), Duration::from_millis(100));
    assert_eq!(config.run_policy().mode, ConcurrencyMode::Topological);
    assert_eq!(config.output_mode(), OutputMode::Buffered);
}

#[test]
fn test_fixed_version() {
    let config = MonoshipConfig::parse("version = \"1.4.0\"\n").unwrap();
    assert_eq!(config.versioning().unwrap(), Versioning::Fixed(Version::new(1, 4, 0)));
    assert_eq!(config.tag_pattern(), "v*");

    let bad = MonoshipConfig::parse("version = \"one\"\n").unwrap();
    assert!(matches!(bad.versioning(), Err(Error::Config(_))));
}

#[test]
fn test_sections() {
    let config = MonoshipConfig::parse(
        r#"
packages = ["libs/*", "apps/*"]
graph_type = "dependencies"

[changed]
ignore_changes = ["*.md"]

[release]
conventional_commits = true
conventional_graduate = ["*"]
preid = "beta"
allow_branch = ["main"]

[exec]
concurrency = 1

[watch]
emit_changes_delay = 250
watch_all_events = true
"#,
    )
    .unwrap();

    assert_eq!(config.packages, vec!["libs/*", "apps/*"]);
    assert_eq!(config.graph_options().graph_type, GraphType::Dependencies);
    assert_eq!(config.change_options().ignore_changes, vec!["*.md"]);
    assert!(config.change_options().conventional_commits);
    assert!(config.conventional_options().graduate.matches("anything"));
    assert_eq!(config.plan_options().unwrap().prerelease.preid.as_deref(), Some("beta"));
    assert_eq!(config.run_policy().mode, ConcurrencyMode::Serial);
    assert_eq!(config.quiet_period(), Duration::from_millis(250));
    assert!(config.watch_filter().unlink_dir);
}

#[test]
fn test_negated_keys_fold_into_positive_ones() {
    let config = MonoshipConfig::parse(
        r#"
[release]
no_push = true
no_git_tag_version = true
no_changelog = false

[exec]
no_bail = true
"#,
    )
    .unwrap();

    assert!(!config.release.push);
    assert!(!config.release.git_tag_version);
    assert!(config.release.changelog);
    assert!(!config.exec.bail);
}

#[test]
fn test_positive_key_wins_over_negation() {
    let config = MonoshipConfig::parse(
        r#"
[release]
push = true
no_push = true
"#,
    )
    .unwrap();
    assert!(config.release.push);
}

#[test]
fn test_negation_strips_a_single_prefix() {
    // `no_no_push` negates a `no_push` key, not `push`.
    let config = MonoshipConfig::parse("[release]\nno_no_push = true\n").unwrap();
    assert!(config.release.push);
}

#[test]
fn test_publish_summary_and_watch_ignored() {
    let config = MonoshipConfig::parse(
        r#"
[publish]
summary_file = "reports/publish.json"

[watch]
ignored = ["*.log", "dist/**"]
"#,
    )
    .unwrap();

    assert_eq!(config.publish.summary_file.as_deref(), Some("reports/publish.json"));
    let ignored = config.watch_ignored().unwrap();
    assert_eq!(ignored.len(), 2);
    assert!(ignored[0].matches("server.log"));

    let bad = MonoshipConfig::parse("[watch]\nignored = [\"[\"]\n").unwrap();
    assert!(matches!(bad.watch_ignored(), Err(Error::Config(_))));
}

#[test]
fn test_non_boolean_negation_is_rejected() {
    let result = MonoshipConfig::parse("[exec]\nno_bail = \"yes\"\n");
    match result {
        Err(Error::Config(message)) => assert!(message.contains("exec.no_bail")),
        other => panic!("expected a config error, got {:?}", other),
    }
}

#[test]
fn test_deprecated_keys_are_mapped() {
    let config = MonoshipConfig::parse(
        r#"
[exec]
cmd_dry_run = true

[release]
changelog_include_commit_author_fullname = true
"#,
    )
    .unwrap();
    assert!(config.exec.dry_run);
    assert!(config.release.changelog_include_commits_git_author);
}

#[test]
fn test_invalid_toml() {
    assert!(matches!(
        MonoshipConfig::parse("packages = ["),
        Err(Error::Toml { .. })
    ));
}

#[test]
fn test_load_and_discover() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("packages/pkg-a/src");
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(MonoshipConfig::load(temp.path()).unwrap(), MonoshipConfig::default());

    fs::write(temp.path().join(CONFIG_FILE), "version = \"2.0.0\"\n").unwrap();
    assert_eq!(MonoshipConfig::discover(&nested), Some(temp.path().to_path_buf()));
    assert!(!MonoshipConfig::load(temp.path()).unwrap().is_independent());

    fs::write(temp.path().join(CONFIG_FILE), "packages = 3\n").unwrap();
    match MonoshipConfig::load(temp.path()) {
        Err(Error::Toml { context, .. }) => assert!(context.ends_with(CONFIG_FILE)),
        other => panic!("expected a toml error, got {:?}", other),
    }
}

#[test]
fn test_write_fixed_version_keeps_formatting() {
    let content = "# workspace\nversion = \"1.0.0\" # shared\npackages = [\"packages/*\"]\n";
    let updated = write_fixed_version(content, &Version::new(1, 1, 0)).unwrap();

    assert!(updated.starts_with("# workspace\n"));
    assert!(updated.contains("version = \"1.1.0\""));
    assert!(updated.contains("packages = [\"packages/*\"]"));
}
