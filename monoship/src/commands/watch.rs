//! Watch mode command.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use glob::Pattern;
use monoship_core::executor::ShellCommand;
use monoship_core::path_utils::PackageLocator;
use monoship_core::scheduler::{ExecutionPlan, Scheduler};
use monoship_core::streaming::{output_channel, OutputHandler};
use monoship_core::watch::{ChangeBatch, WatchDebouncer};
use monoship_core::watcher::FileWatcher;
use tokio::sync::mpsc;

use crate::formatting::{
    print_key_value, print_section_header, print_status_table, print_warning, SectionStyle,
};
use crate::{FilterArgs, WatchArgs};

use super::{block_on, cancel_on_interrupt, Workspace};

pub fn cmd_watch(cwd: Option<PathBuf>, args: WatchArgs, filter: FilterArgs, command: String) -> Result<bool> {
    let workspace = Workspace::load(cwd, |config| args.apply(config))?;
    let watched: BTreeSet<String> = workspace.filter(&filter)?.into_iter().collect();
    let cancel = cancel_on_interrupt()?;

    print_section_header("Watch Mode", SectionStyle::Primary);
    print_key_value("Watching", &workspace.root.display().to_string());
    print_key_value("Command", &command);
    print_key_value("Packages", &watched.len().to_string());
    println!("  Press Ctrl+C to stop");
    println!();

    let mut debouncer = WatchDebouncer::new(
        workspace.config.quiet_period(),
        workspace.config.watch_filter(),
        PackageLocator::new(&workspace.root, &workspace.graph),
    );
    if let Some(glob) = &workspace.config.watch.glob {
        let pattern = Pattern::new(glob).with_context(|| format!("invalid watch glob '{}'", glob))?;
        debouncer = debouncer.with_glob(pattern);
    }
    debouncer = debouncer.with_ignored(workspace.config.watch_ignored()?);

    block_on(async move {
        let (_watcher, events) = FileWatcher::new(&workspace.root)?;
        let (batch_tx, mut batches) = mpsc::unbounded_channel::<ChangeBatch>();
        tokio::spawn(debouncer.run(events, batch_tx));

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            let names: Vec<String> = batch
                .packages
                .iter()
                .filter(|name| watched.contains(*name))
                .cloned()
                .collect();
            if names.is_empty() {
                continue;
            }
            print_warning(&format!("Change detected in {}", names.join(", ")));

            let files = batch.joined_files(&workspace.config.watch.file_delimiter);
            let unit = ShellCommand::new(command.clone(), &workspace.root)
                .with_file_changes(files)
                .with_dry_run(workspace.config.exec.dry_run);
            let plan = ExecutionPlan::new(&workspace.graph, names, workspace.config.exec.sort)?;

            let (sender, receiver) = output_channel();
            let printer = tokio::spawn(OutputHandler::new(workspace.config.output_mode()).drain(
                receiver,
                |line| println!("{}", line.plain()),
            ));
            let result = Scheduler::new()
                .with_output(sender)
                .run(&plan, Arc::new(unit), &workspace.config.run_policy(), cancel.child_token())
                .await;
            let _ = printer.await;

            println!();
            print_status_table(&result);
            println!();
        }

        println!();
        print_warning("Stopping watch mode...");
        Ok::<_, anyhow::Error>(())
    })??;

    Ok(true)
}
