//! Debouncing of raw file events into package change batches.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::change::is_ignored;
use crate::path_utils::PackageLocator;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawEventKind {
    Add,
    AddDir,
    Change,
    Unlink,
    UnlinkDir,
}

/// A single notification from the watch primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Event kinds that count as a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchEventFilter {
    pub add: bool,
    pub add_dir: bool,
    pub change: bool,
    pub unlink: bool,
    pub unlink_dir: bool,
}

impl Default for WatchEventFilter {
    fn default() -> Self {
        Self {
            add: false,
            add_dir: false,
            change: true,
            unlink: false,
            unlink_dir: false,
        }
    }
}

impl WatchEventFilter {
    pub fn all() -> Self {
        Self {
            add: true,
            add_dir: true,
            change: true,
            unlink: true,
            unlink_dir: true,
        }
    }

    pub fn allows(&self, kind: RawEventKind) -> bool {
        match kind {
            RawEventKind::Add => self.add,
            RawEventKind::AddDir => self.add_dir,
            RawEventKind::Change => self.change,
            RawEventKind::Unlink => self.unlink,
            RawEventKind::UnlinkDir => self.unlink_dir,
        }
    }
}

/// One coalesced notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub packages: BTreeSet<String>,
    pub files: Vec<PathBuf>,
}

impl ChangeBatch {
    /// Changed files joined with `delimiter`, for the command environment.
    pub fn joined_files(&self, delimiter: &str) -> String {
        self.files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

/// Coalesces bursts of raw events behind one shared quiet-period timer.
///
/// Every accepted event pushes the deadline out to `now + quiet`. Once the
/// deadline passes without new events, [`flush`](Self::flush) hands out the
/// collected batch and the buffer starts over.
pub struct WatchDebouncer {
    quiet: Duration,
    filter: WatchEventFilter,
    locator: PackageLocator,
    glob: Option<Pattern>,
    ignored: Vec<Pattern>,
    pending: ChangeBatch,
    deadline: Option<Instant>,
}

impl WatchDebouncer {
    pub fn new(quiet: Duration, filter: WatchEventFilter, locator: PackageLocator) -> Self {
        Self {
            quiet,
            filter,
            locator,
            glob: None,
            ignored: Vec::new(),
            pending: ChangeBatch::default(),
            deadline: None,
        }
    }

    /// Only files matching `glob`, relative to their package, are considered.
    pub fn with_glob(mut self, glob: Pattern) -> Self {
        self.glob = Some(glob);
        self
    }

    /// Files matching any of `ignored`, relative to their package, are dropped.
    /// Globs without a `/` also match the bare file name.
    pub fn with_ignored(mut self, ignored: Vec<Pattern>) -> Self {
        self.ignored = ignored;
        self
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.packages.is_empty()
    }

    /// Records an event, returning whether it was accepted.
    pub fn record(&mut self, event: RawEvent, now: Instant) -> bool {
        if !self.filter.allows(event.kind) {
            trace!(kind = ?event.kind, path = %event.path.display(), "event kind filtered");
            return false;
        }
        let Some((package, relative)) = self.locate(&event.path) else {
            trace!(path = %event.path.display(), "event outside any package");
            return false;
        };
        if let Some(glob) = &self.glob {
            let options = MatchOptions {
                require_literal_separator: true,
                ..MatchOptions::new()
            };
            if !glob.matches_with(&relative, options) {
                return false;
            }
        }
        if is_ignored(&relative, &self.ignored) {
            trace!(path = %event.path.display(), "event ignored");
            return false;
        }

        self.pending.packages.insert(package);
        if !self.pending.files.contains(&event.path) {
            self.pending.files.push(event.path);
        }
        self.deadline = Some(now + self.quiet);
        true
    }

    /// Emits the batch once the quiet period has elapsed.
    pub fn flush(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Emits whatever is pending regardless of the timer.
    pub fn take(&mut self) -> Option<ChangeBatch> {
        self.deadline = None;
        if self.pending.packages.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.pending);
        debug!(packages = batch.packages.len(), files = batch.files.len(), "emitting change batch");
        Some(batch)
    }

    /// Drives the debouncer until the event stream ends or nobody listens.
    ///
    /// Whatever is pending when the stream closes is emitted before returning.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<RawEvent>,
        batches: mpsc::UnboundedSender<ChangeBatch>,
    ) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.record(event, Instant::now());
                    }
                    None => {
                        if let Some(batch) = self.take() {
                            let _ = batches.send(batch);
                        }
                        return;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(batch) = self.flush(Instant::now()) {
                        if batches.send(batch).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn locate(&self, path: &Path) -> Option<(String, String)> {
        self.locator
            .locate(path)
            .map(|(name, relative)| (name.to_string(), relative))
    }
}
