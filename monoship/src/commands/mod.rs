//! Command implementations for the CLI.

mod discovery;
mod execution;
mod release;
mod release_reporter;
mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use monoship_core::adapter_registry::AdapterRegistry;
use monoship_core::config::MonoshipConfig;
use monoship_core::graph::DependencyGraph;
use monoship_core::scanner::Scanner;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::FilterArgs;

pub use discovery::{cmd_changed, cmd_diff, cmd_list};
pub use execution::{cmd_exec, cmd_run};
pub use release::{cmd_publish, cmd_version};
pub use watch::cmd_watch;

/// A scanned workspace with its resolved configuration.
pub(crate) struct Workspace {
    pub root: PathBuf,
    pub config: MonoshipConfig,
    pub adapters: AdapterRegistry,
    pub graph: DependencyGraph,
}

impl Workspace {
    /// Locates the workspace, lets `adjust` apply CLI overrides, then scans.
    pub fn load(cwd: Option<PathBuf>, adjust: impl FnOnce(&mut MonoshipConfig)) -> Result<Self> {
        let start = match cwd {
            Some(dir) => dir,
            None => std::env::current_dir().context("failed to read the current directory")?,
        };
        let root = MonoshipConfig::discover(&start).unwrap_or(start);
        let mut config = MonoshipConfig::load(&root)?;
        adjust(&mut config);

        let adapters = monoship_adapters::default_registry();
        let packages = Scanner::new(&root, &config.packages, &adapters)?.scan()?;
        let graph = DependencyGraph::build(packages, config.graph_options())?;
        debug!(root = %root.display(), packages = graph.len(), "workspace loaded");

        Ok(Self {
            root,
            config,
            adapters,
            graph,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Package names passing the scope and ignore globs, in graph order.
    pub fn filter(&self, filter: &FilterArgs) -> Result<Vec<String>> {
        let scope = compile(&filter.scope)?;
        let ignore = compile(&filter.ignore)?;
        Ok(self
            .graph
            .topological_order()
            .iter()
            .filter(|name| scope.is_empty() || scope.iter().any(|p| p.matches(name)))
            .filter(|name| !ignore.iter().any(|p| p.matches(name)))
            .cloned()
            .collect())
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid package glob '{}'", p)))
        .collect()
}

/// Runs `future` to completion on a fresh multi-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
    Ok(runtime.block_on(future))
}

/// Cancels the returned token on Ctrl-C.
pub(crate) fn cancel_on_interrupt() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler = token.clone();
    ctrlc::set_handler(move || handler.cancel())
        .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;
    Ok(token)
}
