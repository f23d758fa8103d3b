//! File watching that feeds the watch debouncer.

use std::path::{Component, Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::Config as NotifyConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Error, Result};
use crate::watch::{RawEvent, RawEventKind};

const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Recursive watch over the workspace, translated into [`RawEvent`]s.
///
/// The underlying watcher stops when this value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Result<(Self, mpsc::UnboundedReceiver<RawEvent>)> {
        let root = root.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for raw in translate(&event) {
                        if tx.send(raw).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watch error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(format!("Failed to watch {}: {}", root.display(), e)))?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Maps a notify event onto zero or more raw events.
pub fn translate(event: &Event) -> Vec<RawEvent> {
    event
        .paths
        .iter()
        .filter(|path| !is_ignored(path))
        .filter_map(|path| kind_of(&event.kind, path).map(|kind| RawEvent::new(kind, path.clone())))
        .collect()
}

fn kind_of(kind: &EventKind, path: &Path) -> Option<RawEventKind> {
    match kind {
        EventKind::Create(CreateKind::Folder) => Some(RawEventKind::AddDir),
        EventKind::Create(CreateKind::File) => Some(RawEventKind::Add),
        EventKind::Create(_) => Some(if path.is_dir() {
            RawEventKind::AddDir
        } else {
            RawEventKind::Add
        }),
        EventKind::Remove(RemoveKind::Folder) => Some(RawEventKind::UnlinkDir),
        EventKind::Remove(_) => Some(RawEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(RawEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(if path.is_dir() {
            RawEventKind::AddDir
        } else {
            RawEventKind::Add
        }),
        EventKind::Modify(_) => Some(RawEventKind::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .map(|n| IGNORED_DIRS.contains(&n))
            .unwrap_or(false),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    #[test]
    fn content_modification_is_a_change() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/ws/packages/a/index.js"));
        assert_eq!(
            translate(&event),
            vec![RawEvent::new(RawEventKind::Change, "/ws/packages/a/index.js")]
        );
    }

    #[test]
    fn folder_events_keep_their_kind() {
        let created = Event::new(EventKind::Create(CreateKind::Folder)).add_path(PathBuf::from("/ws/a/lib"));
        let removed = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(PathBuf::from("/ws/a/lib"));
        assert_eq!(translate(&created)[0].kind, RawEventKind::AddDir);
        assert_eq!(translate(&removed)[0].kind, RawEventKind::UnlinkDir);
    }

    #[test]
    fn vcs_and_dependency_dirs_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/ws/packages/a/node_modules/x/index.js"))
            .add_path(PathBuf::from("/ws/.git/index"));
        assert!(translate(&event).is_empty());
    }
}
