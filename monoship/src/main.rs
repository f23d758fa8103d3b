mod commands;
mod formatting;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use monoship_core::config::MonoshipConfig;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "monoship")]
#[command(about = "Monorepo release orchestration: change detection, versioning, publishing and task execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace directory; defaults to the nearest ancestor with a monoship.toml.
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List workspace packages.
    List(ListArgs),
    /// List packages changed since the last release.
    Changed {
        #[arg(long, action)]
        json: bool,
        #[command(flatten)]
        change: ChangeArgs,
    },
    /// Bump versions, write changelogs, commit, tag and push.
    Version(VersionArgs),
    /// Version, then publish released packages to the registry.
    Publish(PublishArgs),
    /// Show the diff since the last release, for one package or all of them.
    Diff {
        package: Option<String>,
        #[arg(long)]
        since: Option<String>,
    },
    /// Run a shell command in every package.
    Exec {
        #[command(flatten)]
        exec: ExecArgs,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Run a manifest script in every package that declares it.
    Run {
        script: String,
        #[command(flatten)]
        exec: ExecArgs,
        /// Package manager used to invoke the script.
        #[arg(long)]
        npm_client: Option<String>,
    },
    /// Re-run a command in packages whose files change.
    Watch {
        #[command(flatten)]
        watch: WatchArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Args, Clone, Default)]
pub struct ListArgs {
    /// Sort by dependency order instead of by name.
    #[arg(long, action)]
    toposort: bool,
    /// Print the dependency graph as an adjacency list.
    #[arg(long, action, conflicts_with_all = ["json", "ndjson", "parseable"])]
    graph: bool,
    #[arg(long, action, conflicts_with_all = ["ndjson", "parseable"])]
    json: bool,
    /// One JSON object per line.
    #[arg(long, action, conflicts_with = "parseable")]
    ndjson: bool,
    /// Package directories, one per line.
    #[arg(short, long, action)]
    parseable: bool,
    /// Show locations, or `dir:name:version` with --parseable.
    #[arg(short, long, action)]
    long: bool,
    /// Include private packages.
    #[arg(short, long, action)]
    all: bool,
}

#[derive(Args, Clone, Default)]
pub struct ChangeArgs {
    /// Compare against this ref instead of the last release tag.
    #[arg(long)]
    since: Option<String>,
    #[arg(long, value_delimiter = ',')]
    ignore_changes: Vec<String>,
    #[arg(long, action)]
    include_merged_tags: bool,
    /// Treat these packages as changed; `*` for all.
    #[arg(long, value_delimiter = ',')]
    force_publish: Vec<String>,
}

impl ChangeArgs {
    fn apply(&self, config: &mut MonoshipConfig) {
        config.changed.ignore_changes.extend(self.ignore_changes.iter().cloned());
        config.changed.include_merged_tags |= self.include_merged_tags;
        config.changed.force_publish.extend(self.force_publish.iter().cloned());
    }
}

#[derive(Args, Clone, Default)]
pub struct VersionArgs {
    /// `major`, `minor`, `patch`, `premajor`, `preminor`, `prepatch`,
    /// `prerelease` or an explicit version.
    bump: Option<String>,
    #[command(flatten)]
    change: ChangeArgs,
    #[arg(long, action)]
    conventional_commits: bool,
    /// Graduate these prerelease packages; `*` for all.
    #[arg(long, value_delimiter = ',')]
    conventional_graduate: Vec<String>,
    /// Release these packages as prereleases; `*` for all.
    #[arg(long, value_delimiter = ',')]
    conventional_prerelease: Vec<String>,
    #[arg(long)]
    preid: Option<String>,
    #[arg(long, action)]
    exact: bool,
    #[arg(short, long)]
    message: Option<String>,
    #[arg(long, action)]
    amend: bool,
    #[arg(long, action)]
    no_push: bool,
    #[arg(long, action)]
    no_git_tag_version: bool,
    #[arg(long, action)]
    no_changelog: bool,
    #[arg(long, action)]
    no_private: bool,
    #[arg(long, action)]
    sign_git_commit: bool,
    #[arg(long, action)]
    sign_git_tag: bool,
    #[arg(long, value_delimiter = ',')]
    allow_branch: Vec<String>,
    #[arg(long, action)]
    dry_run: bool,
}

impl VersionArgs {
    fn apply(&self, config: &mut MonoshipConfig) {
        self.change.apply(config);
        let release = &mut config.release;
        release.conventional_commits |= self.conventional_commits;
        release.conventional_graduate.extend(self.conventional_graduate.iter().cloned());
        release.conventional_prerelease.extend(self.conventional_prerelease.iter().cloned());
        if self.preid.is_some() {
            release.preid = self.preid.clone();
        }
        if self.message.is_some() {
            release.message = self.message.clone();
        }
        release.exact |= self.exact;
        release.amend |= self.amend;
        release.push &= !self.no_push;
        release.git_tag_version &= !self.no_git_tag_version;
        release.changelog &= !self.no_changelog;
        release.private &= !self.no_private;
        release.sign_git_commit |= self.sign_git_commit;
        release.sign_git_tag |= self.sign_git_tag;
        if !self.allow_branch.is_empty() {
            release.allow_branch = self.allow_branch.clone();
        }
        config.exec.dry_run |= self.dry_run;
    }
}

#[derive(Args, Clone, Default)]
pub struct PublishArgs {
    #[command(flatten)]
    version: VersionArgs,
    #[arg(long)]
    dist_tag: Option<String>,
    #[arg(long)]
    pre_dist_tag: Option<String>,
    #[arg(long)]
    otp: Option<String>,
    #[arg(long)]
    registry: Option<String>,
    #[arg(long, action)]
    no_bail: bool,
    #[arg(long)]
    concurrency: Option<usize>,
    /// Skip versioning and publish the releases tagged at HEAD.
    #[arg(long, action, conflicts_with = "from_package")]
    from_git: bool,
    /// Skip versioning and publish manifest versions missing from the registry.
    #[arg(long, action)]
    from_package: bool,
    /// Write a JSON report of publish outcomes to this file or directory.
    #[arg(long)]
    summary_file: Option<String>,
}

impl PublishArgs {
    fn source(&self) -> Option<monoship_core::PublishSource> {
        if self.from_git {
            Some(monoship_core::PublishSource::Git)
        } else if self.from_package {
            Some(monoship_core::PublishSource::Package)
        } else {
            None
        }
    }

    fn apply(&self, config: &mut MonoshipConfig) {
        self.version.apply(config);
        let publish = &mut config.publish;
        if let Some(tag) = &self.dist_tag {
            publish.dist_tag = tag.clone();
        }
        if self.pre_dist_tag.is_some() {
            publish.pre_dist_tag = self.pre_dist_tag.clone();
        }
        if self.otp.is_some() {
            publish.otp = self.otp.clone();
        }
        if self.registry.is_some() {
            publish.registry = self.registry.clone();
        }
        if self.summary_file.is_some() {
            publish.summary_file = self.summary_file.clone();
        }
        config.exec.bail &= !self.no_bail;
        if self.concurrency.is_some() {
            config.exec.concurrency = self.concurrency;
        }
    }
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Only packages whose name matches one of these globs.
    #[arg(long, value_delimiter = ',')]
    scope: Vec<String>,
    /// Skip packages whose name matches one of these globs.
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,
}

#[derive(Args, Clone, Default)]
pub struct ExecArgs {
    #[command(flatten)]
    filter: FilterArgs,
    /// Only packages changed since this ref, plus their dependents.
    #[arg(long)]
    since: Option<String>,
    #[arg(long, action)]
    no_bail: bool,
    #[arg(long, action)]
    no_prefix: bool,
    #[arg(long, action)]
    no_sort: bool,
    #[arg(long, action)]
    stream: bool,
    #[arg(long, action)]
    parallel: bool,
    #[arg(long)]
    concurrency: Option<usize>,
    #[arg(long, action)]
    dry_run: bool,
}

impl ExecArgs {
    fn apply(&self, config: &mut MonoshipConfig) {
        let exec = &mut config.exec;
        exec.bail &= !self.no_bail;
        exec.prefix &= !self.no_prefix;
        exec.sort &= !self.no_sort;
        exec.stream |= self.stream;
        exec.parallel |= self.parallel;
        exec.dry_run |= self.dry_run;
        if self.concurrency.is_some() {
            exec.concurrency = self.concurrency;
        }
    }
}

#[derive(Args, Clone, Default)]
pub struct WatchArgs {
    /// Quiet period in milliseconds.
    #[arg(long)]
    emit_changes_delay: Option<u64>,
    #[arg(long)]
    file_delimiter: Option<String>,
    /// Only react to files matching this glob, relative to the package.
    #[arg(long)]
    glob: Option<String>,
    /// Never react to files matching these globs.
    #[arg(long, value_delimiter = ',')]
    ignored: Vec<String>,
    #[arg(long, action)]
    watch_all_events: bool,
    #[arg(long, action)]
    watch_added_file: bool,
    #[arg(long, action)]
    watch_added_dir: bool,
    #[arg(long, action)]
    watch_removed_file: bool,
    #[arg(long, action)]
    watch_removed_dir: bool,
}

impl WatchArgs {
    fn apply(&self, config: &mut MonoshipConfig) {
        let watch = &mut config.watch;
        if let Some(delay) = self.emit_changes_delay {
            watch.emit_changes_delay = delay;
        }
        if let Some(delimiter) = &self.file_delimiter {
            watch.file_delimiter = delimiter.clone();
        }
        if self.glob.is_some() {
            watch.glob = self.glob.clone();
        }
        watch.ignored.extend(self.ignored.iter().cloned());
        watch.watch_all_events |= self.watch_all_events;
        watch.watch_added_file |= self.watch_added_file;
        watch.watch_added_dir |= self.watch_added_dir;
        watch.watch_removed_file |= self.watch_removed_file;
        watch.watch_removed_dir |= self.watch_removed_dir;
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = cli.cwd;
    let success = match cli.command {
        Commands::List(args) => commands::cmd_list(cwd, args)?,
        Commands::Changed { json, change } => commands::cmd_changed(cwd, change, json)?,
        Commands::Version(args) => commands::cmd_version(cwd, args)?,
        Commands::Publish(args) => commands::cmd_publish(cwd, args)?,
        Commands::Diff { package, since } => commands::cmd_diff(cwd, package, since)?,
        Commands::Exec { exec, command } => commands::cmd_exec(cwd, exec, command.join(" "))?,
        Commands::Run {
            script,
            exec,
            npm_client,
        } => commands::cmd_run(cwd, exec, script, npm_client)?,
        Commands::Watch {
            watch,
            filter,
            command,
        } => commands::cmd_watch(cwd, watch, filter, command.join(" "))?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
