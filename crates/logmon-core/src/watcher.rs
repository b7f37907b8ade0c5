//! Directory watch built on the `notify` crate.
//!
//! The parent directory of the target file is watched non-recursively, so
//! creation, deletion and renames of the file are seen as well as writes.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::MonitorError;

/// Filesystem event relevant to a tailed file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    /// Either side may be unknown when the backend reports halves separately
    Renamed {
        from: Option<PathBuf>,
        to: Option<PathBuf>,
    },
}

impl WatchEvent {
    /// Translate a raw notify event. Access events are dropped.
    pub fn from_notify(event: Event) -> Vec<WatchEvent> {
        let Event { kind, paths, .. } = event;

        match kind {
            EventKind::Access(_) => Vec::new(),
            EventKind::Create(_) => paths.into_iter().map(Self::Created).collect(),
            EventKind::Remove(_) => paths.into_iter().map(Self::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => Self::from_rename(mode, paths),
            EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
                paths.into_iter().map(Self::Changed).collect()
            }
        }
    }

    fn from_rename(mode: RenameMode, paths: Vec<PathBuf>) -> Vec<WatchEvent> {
        match mode {
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                vec![Self::Renamed {
                    from: paths.next(),
                    to: paths.next(),
                }]
            }
            RenameMode::From => paths
                .into_iter()
                .map(|p| Self::Renamed {
                    from: Some(p),
                    to: None,
                })
                .collect(),
            RenameMode::To => paths
                .into_iter()
                .map(|p| Self::Renamed {
                    from: None,
                    to: Some(p),
                })
                .collect(),
            // Backends that cannot tell the halves apart: the side that still
            // exists is the destination.
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .map(|p| {
                    if p.exists() {
                        Self::Renamed {
                            from: None,
                            to: Some(p),
                        }
                    } else {
                        Self::Renamed {
                            from: Some(p),
                            to: None,
                        }
                    }
                })
                .collect(),
        }
    }
}

/// Live watch on one directory. Dropping it stops the watch.
pub struct DirWatch {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl DirWatch {
    /// Start watching `dir`, delivering translated events to `handler` on the
    /// watcher's background thread.
    pub fn new<F>(dir: &Path, handler: F) -> Result<Self, MonitorError>
    where
        F: Fn(WatchEvent) + Send + 'static,
    {
        let watch_error = |source| MonitorError::Watch {
            path: dir.to_path_buf(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for e in WatchEvent::from_notify(event) {
                    handler(e);
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        })
        .map_err(watch_error)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        tracing::debug!(dir = %dir.display(), "watching directory");

        Ok(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for DirWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirWatch").field("dir", &self.dir).finish()
    }
}
