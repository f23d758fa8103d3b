//! Task execution commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use monoship_core::change::{ChangeDetector, ReferencePoint};
use monoship_core::config::MonoshipConfig;
use monoship_core::executor::{ScriptCommand, ShellCommand};
use monoship_core::git::SystemGit;
use monoship_core::graph::DependencyGraph;
use monoship_core::scheduler::{ExecutionPlan, RunPolicy, RunResult, Scheduler, UnitOfWork};
use monoship_core::streaming::{output_channel, OutputEvent, OutputHandler, OutputMode, OutputStream, RenderedLine};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::formatting::{
    create_progress_bar, format_duration, print_key_value, print_section_header,
    print_status_table, print_success, print_warning, SectionStyle,
};
use crate::ExecArgs;

use super::{block_on, cancel_on_interrupt, Workspace};

pub fn cmd_exec(cwd: Option<PathBuf>, args: ExecArgs, command: String) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let names = select_packages(&workspace, &args, |_| true)?;

    print_section_header("Exec", SectionStyle::Primary);
    print_key_value("Command", &command);
    print_key_value("Packages", &names.len().to_string());
    println!();

    let unit = ShellCommand::new(command, &workspace.root).with_dry_run(workspace.config.exec.dry_run);
    let cancel = cancel_on_interrupt()?;
    let result = block_on(run_units(&workspace.graph, &workspace.config, names, Arc::new(unit), cancel))??;
    Ok(summarize(&result, workspace.config.exec.bail))
}

pub fn cmd_run(
    cwd: Option<PathBuf>,
    args: ExecArgs,
    script: String,
    npm_client: Option<String>,
) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| {
        args.apply(config);
        if let Some(client) = npm_client {
            config.exec.npm_client = client;
        }
    })?;
    let names = select_packages(&workspace, &args, |package| package.has_script(&script))?;

    print_section_header("Run", SectionStyle::Primary);
    print_key_value("Script", &script);
    print_key_value("Packages", &names.len().to_string());
    println!();

    if names.is_empty() {
        print_warning(&format!("No packages declare a '{}' script", script));
        return Ok(true);
    }

    let unit = ScriptCommand::new(script, workspace.config.exec.npm_client.clone(), &workspace.root)
        .with_dry_run(workspace.config.exec.dry_run);
    let cancel = cancel_on_interrupt()?;
    let result = block_on(run_units(&workspace.graph, &workspace.config, names, Arc::new(unit), cancel))??;
    Ok(summarize(&result, workspace.config.exec.bail))
}

/// Applies scope and ignore globs, `--since`, and `keep`.
fn select_packages(
    workspace: &Workspace,
    args: &ExecArgs,
    keep: impl Fn(&monoship_core::Package) -> bool,
) -> Result<Vec<String>> {
    let mut names = workspace.filter(&args.filter)?;
    if let Some(since) = &args.since {
        let git = SystemGit::new(&workspace.root);
        let changes = ChangeDetector::detect(
            &workspace.graph,
            &git,
            workspace.root(),
            &ReferencePoint::Explicit(since.clone()),
            &workspace.config.change_options(),
        )?;
        names.retain(|name| changes.contains(name));
    }
    names.retain(|name| workspace.graph.package(name).map(&keep).unwrap_or(false));
    Ok(names)
}

/// Runs `unit` over `names`, rendering output according to the exec config.
pub(crate) async fn run_units(
    graph: &DependencyGraph,
    config: &MonoshipConfig,
    names: Vec<String>,
    unit: Arc<dyn UnitOfWork>,
    cancel: CancellationToken,
) -> Result<RunResult> {
    let plan = ExecutionPlan::new(graph, names, config.exec.sort)?;
    let policy: RunPolicy = config.run_policy();
    let mode = config.output_mode();

    let (sender, mut receiver) = output_channel();
    let scheduler = Scheduler::new().with_output(sender);

    let pb = create_progress_bar(plan.len() as u64);
    if mode != OutputMode::Buffered {
        pb.finish_and_clear();
    }
    let printer = {
        let pb = pb.clone();
        tokio::spawn(async move {
            let mut handler = OutputHandler::new(mode);
            while let Some(event) = receiver.recv().await {
                if let OutputEvent::Finished(package) = &event {
                    pb.inc(1);
                    pb.set_message(package.clone());
                }
                for line in handler.handle(event) {
                    pb.suspend(|| print_line(&line));
                }
            }
            for line in handler.flush() {
                pb.suspend(|| print_line(&line));
            }
        })
    };

    let start = Instant::now();
    let result = scheduler.run(&plan, unit, &policy, cancel).await;
    drop(scheduler);
    let _ = printer.await;
    pb.finish_and_clear();

    println!();
    print_key_value("Elapsed", &format_duration(start.elapsed().as_secs_f64()));
    Ok(result)
}

fn print_line(line: &RenderedLine) {
    let text = match &line.prefix {
        Some(prefix) => format!("{} {}", format!("{}:", prefix).bright_black().bold(), line.text),
        None => line.text.clone(),
    };
    match line.stream {
        OutputStream::Stdout => println!("{}", text),
        OutputStream::Stderr => eprintln!("{}", text),
    }
}

/// Exit status of a run. Cancelled work always fails it; failed packages
/// only count when `bail` is on.
pub(crate) fn run_succeeded(result: &RunResult, bail: bool) -> bool {
    result.is_success() || (!bail && result.cancelled().is_empty())
}

/// Prints the status table and returns the exit status of the run.
pub(crate) fn summarize(result: &RunResult, bail: bool) -> bool {
    println!();
    print_status_table(result);
    println!();

    let succeeded = result.succeeded().len();
    let failed = result.failures().len();
    let skipped = result.skipped().len();
    let cancelled = result.cancelled().len();
    if failed == 0 && skipped == 0 && cancelled == 0 {
        print_section_header(&format!("{} package(s) succeeded", succeeded), SectionStyle::Success);
    } else if failed == 0 && cancelled == 0 {
        print_success(&format!("{} succeeded, {} skipped", succeeded, skipped));
    } else {
        print_section_header(
            &format!(
                "{} succeeded, {} failed, {} skipped, {} cancelled",
                succeeded, failed, skipped, cancelled
            ),
            SectionStyle::Warning,
        );
    }
    run_succeeded(result, bail)
}
