//! Dependency-aware execution of a unit of work across packages.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, GraphError};
use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::streaming::{OutputEvent, OutputLine, OutputSender, OutputStream};

/// How units of work are started relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One package at a time, in plan order.
    Serial,
    /// A package starts once all of its in-plan dependencies succeeded.
    #[default]
    Topological,
    /// No ordering, only the concurrency limit.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub mode: ConcurrencyMode,
    /// Maximum units in flight; `None` is unlimited.
    pub concurrency: Option<usize>,
    /// Stop starting new work after the first failure.
    pub bail: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::Topological,
            concurrency: None,
            bail: true,
        }
    }
}

impl RunPolicy {
    fn limit(&self) -> usize {
        match self.mode {
            ConcurrencyMode::Serial => 1,
            _ => self.concurrency.unwrap_or(usize::MAX).max(1),
        }
    }
}

/// The packages of a run and the in-plan dependency edges between them.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<String>,
    packages: BTreeMap<String, Package>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl ExecutionPlan {
    /// Plans `names` in topological order when `sort` is set, lexically otherwise.
    ///
    /// Only edges between planned packages are kept. Edges inside a collapsed
    /// cycle are dropped so its members never wait on each other.
    pub fn new<I, S>(graph: &DependencyGraph, names: I, sort: bool) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if !graph.contains(name) {
                return Err(GraphError::PackageNotFound {
                    name: name.to_string(),
                    available: graph.packages().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", "),
                });
            }
            selected.insert(name.to_string());
        }

        let order: Vec<String> = if sort {
            graph
                .topological_order()
                .iter()
                .filter(|name| selected.contains(*name))
                .cloned()
                .collect()
        } else {
            selected.iter().cloned().collect()
        };

        let cycle_of: HashMap<&str, usize> = graph
            .cycles()
            .iter()
            .enumerate()
            .flat_map(|(id, members)| members.iter().map(move |m| (m.as_str(), id)))
            .collect();

        let mut dependencies = BTreeMap::new();
        let mut packages = BTreeMap::new();
        for name in &order {
            let mut deps = BTreeSet::new();
            if sort {
                for dep in graph.dependencies_of(name)? {
                    let same_cycle = matches!(
                        (cycle_of.get(name.as_str()), cycle_of.get(dep.as_str())),
                        (Some(a), Some(b)) if a == b
                    );
                    if selected.contains(&dep) && !same_cycle {
                        deps.insert(dep);
                    }
                }
            }
            dependencies.insert(name.clone(), deps);
            if let Some(package) = graph.package(name) {
                packages.insert(name.clone(), package.clone());
            }
        }

        Ok(Self {
            order,
            packages,
            dependencies,
        })
    }

    #[inline]
    pub fn packages(&self) -> &[String] {
        &self.order
    }

    #[inline]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &String> {
        self.dependencies.get(name).into_iter().flatten()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Handle a unit of work uses to report output for its package.
#[derive(Debug, Clone)]
pub struct OutputSink {
    package: String,
    sender: Option<OutputSender>,
}

impl OutputSink {
    pub fn new(package: impl Into<String>, sender: Option<OutputSender>) -> Self {
        Self {
            package: package.into(),
            sender,
        }
    }

    pub fn line(&self, stream: OutputStream, line: impl Into<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(OutputEvent::Line(OutputLine {
                package: self.package.clone(),
                line: line.into(),
                stream,
            }));
        }
    }

    #[inline]
    pub fn stdout(&self, line: impl Into<String>) {
        self.line(OutputStream::Stdout, line);
    }

    #[inline]
    pub fn stderr(&self, line: impl Into<String>) {
        self.line(OutputStream::Stderr, line);
    }

    fn finished(&self) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(OutputEvent::Finished(self.package.clone()));
        }
    }
}

/// Everything a unit of work gets to know about its package.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub package: Package,
    /// Triggered on bail or external abort. Units decide how to honour it.
    pub cancel: CancellationToken,
    pub output: OutputSink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    Failed(ExecutionError),
    Skipped(SkipReason),
    /// Stopped early because the run was cancelled.
    Cancelled,
}

/// An opaque per-package action.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn execute(&self, context: WorkContext) -> WorkOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "package", rename_all = "kebab-case")]
pub enum SkipReason {
    /// An in-plan dependency did not succeed.
    DependencyFailed(String),
    /// Not started because an earlier failure stopped the run.
    Bailed,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageStatus {
    Success,
    Failed(ExecutionError),
    Skipped(SkipReason),
    Cancelled,
}

impl PackageStatus {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, PackageStatus::Success)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, PackageStatus::Failed(_))
    }

    /// Whether dependents may start after this status. A dry run counts as
    /// done so the whole plan gets previewed.
    #[inline]
    pub fn unblocks_dependents(&self) -> bool {
        matches!(
            self,
            PackageStatus::Success | PackageStatus::Skipped(SkipReason::DryRun)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PackageStatus::Success => "success",
            PackageStatus::Failed(_) => "failed",
            PackageStatus::Skipped(_) => "skipped",
            PackageStatus::Cancelled => "cancelled",
        }
    }
}

impl From<WorkOutcome> for PackageStatus {
    fn from(outcome: WorkOutcome) -> Self {
        match outcome {
            WorkOutcome::Success => PackageStatus::Success,
            WorkOutcome::Failed(e) => PackageStatus::Failed(e),
            WorkOutcome::Skipped(reason) => PackageStatus::Skipped(reason),
            WorkOutcome::Cancelled => PackageStatus::Cancelled,
        }
    }
}

/// Outcome of a run, with a status for every planned package.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub outcomes: BTreeMap<String, PackageStatus>,
    /// Packages in the order they were started.
    pub order: Vec<String>,
    pub durations: BTreeMap<String, Duration>,
}

impl RunResult {
    #[inline]
    pub fn status(&self, name: &str) -> Option<&PackageStatus> {
        self.outcomes.get(name)
    }

    /// True when no package failed or was cancelled.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .values()
            .all(|s| !matches!(s, PackageStatus::Failed(_) | PackageStatus::Cancelled))
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.filter(PackageStatus::is_success)
    }

    pub fn failures(&self) -> Vec<(&str, &ExecutionError)> {
        self.outcomes
            .iter()
            .filter_map(|(name, status)| match status {
                PackageStatus::Failed(e) => Some((name.as_str(), e)),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.filter(|s| matches!(s, PackageStatus::Skipped(_)))
    }

    pub fn cancelled(&self) -> Vec<&str> {
        self.filter(|s| matches!(s, PackageStatus::Cancelled))
    }

    fn filter(&self, predicate: impl Fn(&PackageStatus) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, s)| predicate(s))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Runs units of work across an [`ExecutionPlan`].
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    output: Option<OutputSender>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams unit output to `sender`.
    pub fn with_output(mut self, sender: OutputSender) -> Self {
        self.output = Some(sender);
        self
    }

    /// Runs `unit` for every planned package and waits for all started work.
    ///
    /// On failure with `bail`, `cancel` is triggered and nothing new starts;
    /// packages never started are reported `Skipped(Bailed)`. An external
    /// cancellation reports them as `Cancelled` instead.
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        unit: Arc<dyn UnitOfWork>,
        policy: &RunPolicy,
        cancel: CancellationToken,
    ) -> RunResult {
        let limit = policy.limit();
        let gated = policy.mode != ConcurrencyMode::Parallel;

        let mut result = RunResult::default();
        let mut pending: Vec<String> = plan.packages().to_vec();
        let mut running: HashMap<tokio::task::Id, (String, Instant)> = HashMap::new();
        let mut tasks: JoinSet<(String, WorkOutcome)> = JoinSet::new();
        let mut bailed = false;
        let mut cancel_seen = false;

        debug!(packages = plan.len(), ?policy, "starting run");

        loop {
            if !cancel.is_cancelled() {
                let mut idx = 0;
                while idx < pending.len() && running.len() < limit {
                    let name = &pending[idx];
                    let blocked_by = plan
                        .dependencies_of(name)
                        .filter(|_| gated)
                        .find(|dep| {
                            result
                                .outcomes
                                .get(dep.as_str())
                                .map(|s| !s.unblocks_dependents())
                                .unwrap_or(false)
                        })
                        .cloned();
                    if let Some(dep) = blocked_by {
                        info!(package = %name, dependency = %dep, "skipping, dependency did not succeed");
                        result
                            .outcomes
                            .insert(name.clone(), PackageStatus::Skipped(SkipReason::DependencyFailed(dep)));
                        pending.remove(idx);
                        continue;
                    }

                    let ready = !gated
                        || plan
                            .dependencies_of(name)
                            .all(|dep| result.outcomes.contains_key(dep.as_str()));
                    if !ready {
                        idx += 1;
                        continue;
                    }

                    let name = pending.remove(idx);
                    let Some(package) = plan.package(&name).cloned() else {
                        continue;
                    };
                    let context = WorkContext {
                        package,
                        cancel: cancel.clone(),
                        output: OutputSink::new(name.clone(), self.output.clone()),
                    };
                    let unit = Arc::clone(&unit);
                    let task_name = name.clone();
                    let handle = tasks.spawn(async move {
                        let sink = context.output.clone();
                        let outcome = unit.execute(context).await;
                        sink.finished();
                        (task_name, outcome)
                    });
                    debug!(package = %name, "started");
                    result.order.push(name.clone());
                    running.insert(handle.id(), (name, Instant::now()));
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = tasks.join_next_with_id() => {
                    let (id, name, outcome) = match joined {
                        Ok((id, (name, outcome))) => (id, name, outcome),
                        Err(e) => {
                            let id = e.id();
                            let name = running.get(&id).map(|(n, _)| n.clone()).unwrap_or_default();
                            let outcome = WorkOutcome::Failed(ExecutionError::Spawn {
                                package: name.clone(),
                                message: e.to_string(),
                            });
                            (id, name, outcome)
                        }
                    };
                    if let Some((_, started)) = running.remove(&id) {
                        result.durations.insert(name.clone(), started.elapsed());
                    }
                    let status = PackageStatus::from(outcome);
                    if status.is_failure() && policy.bail && !bailed {
                        warn!(package = %name, "failure with bail enabled, stopping the run");
                        bailed = true;
                        cancel.cancel();
                    }
                    result.outcomes.insert(name, status);
                }
                _ = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    if !bailed {
                        info!("run cancelled, waiting for in-flight work");
                    }
                }
            }
        }

        for name in pending {
            let status = if bailed {
                PackageStatus::Skipped(SkipReason::Bailed)
            } else if cancel.is_cancelled() {
                PackageStatus::Cancelled
            } else {
                // Only reachable when dependencies can never be satisfied.
                PackageStatus::Skipped(SkipReason::DependencyFailed(
                    plan.dependencies_of(&name).next().cloned().unwrap_or_default(),
                ))
            };
            result.outcomes.insert(name, status);
        }

        debug!(
            succeeded = result.succeeded().len(),
            failed = result.failures().len(),
            skipped = result.skipped().len(),
            "run finished"
        );
        result
    }
}
