use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use logmon_types::ColumnMapping;

use crate::charset::Charset;
use crate::error::MonitorError;
use crate::event::{ArcRecord, MonitorEvent, Snapshot, Subscribers};
use crate::reader::read_records;
use crate::record::Record;
use crate::splitter::{self, FieldSplitter};
use crate::watcher::{DirWatch, WatchEvent};

/// Engine settings that are not part of a column mapping
#[derive(Clone, Copy, Debug)]
pub struct MonitorOptions {
    /// Charset used to decode the file
    pub charset: Charset,
    /// Arm a filesystem watch on the file's directory. When off, events are
    /// only fed in through [`Monitor::handle_watch_event`].
    pub watch_files: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            charset: Charset::default(),
            watch_files: true,
        }
    }
}

/// Tails one log file, re-parses it on change and publishes the difference.
///
/// Cheap to clone; clones share the same engine. Filesystem events arrive on
/// the watcher thread and are serialized with control calls by an internal
/// lock, so `run`/`stop`/`clear` may be called from any thread.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

struct Shared {
    options: MonitorOptions,
    state: Mutex<State>,
    /// Never locked by the watcher callback, and never touched while `state`
    /// is held.
    watch: Mutex<Option<DirWatch>>,
}

struct Target {
    path: PathBuf,
    file_name: OsString,
    mapping: ColumnMapping,
    splitter: Box<dyn FieldSplitter>,
}

#[derive(Default)]
struct State {
    target: Option<Target>,
    records: Vec<ArcRecord>,
    version: u64,
    is_running: bool,
    /// Whether change events for the watched path still refer to our file
    is_tracking: bool,
    file_exists: bool,
    /// File name change events are accepted for; cleared while the file is gone
    watch_filter: Option<OsString>,
    subscribers: Subscribers,
}

impl Monitor {
    pub fn new(options: MonitorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                state: Mutex::new(State::default()),
                watch: Mutex::new(None),
            }),
        }
    }

    /// Bind the target file and mapping, load the file if it exists and arm
    /// the directory watch. Change events are not acted on until `run`.
    pub fn initialize(
        &self,
        path: impl AsRef<Path>,
        mapping: ColumnMapping,
    ) -> Result<(), MonitorError> {
        let path = path.as_ref().to_path_buf();
        let splitter = splitter::for_mapping(&mapping)?;
        let file_name = path.file_name().map(OsString::from).ok_or_else(|| {
            MonitorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display()),
            ))
        })?;

        tracing::info!(path = %path.display(), mapping = %mapping.name, "initializing monitor");

        {
            let mut state = self.shared.state.lock();
            let exists = path.exists();
            state.watch_filter = Some(file_name.clone());
            state.file_exists = exists;
            state.target = Some(Target {
                path: path.clone(),
                file_name,
                mapping,
                splitter,
            });
            if exists {
                self.shared.reload_locked(&mut state);
            }
        }

        if !self.shared.options.watch_files {
            return Ok(());
        }

        let watch = match self.arm_watch(&path) {
            Ok(watch) => Some(watch),
            Err(e) => {
                // run() retries and reports
                tracing::warn!(error = %e, "directory watch not armed");
                None
            }
        };
        *self.shared.watch.lock() = watch;

        Ok(())
    }

    /// Start following the file. Returns false, leaving the monitor stopped,
    /// when the file does not exist or the watch cannot be armed.
    pub fn run(&self) -> bool {
        let Some(path) = self.path() else {
            tracing::warn!("run requested before initialize");
            return false;
        };

        if !path.exists() {
            let mut state = self.shared.state.lock();
            self.shared.update_file_state_locked(&mut state, false);
            return false;
        }

        if self.shared.options.watch_files {
            let mut watch = self.shared.watch.lock();
            if watch.is_none() {
                match self.arm_watch(&path) {
                    Ok(armed) => *watch = Some(armed),
                    Err(e) => {
                        tracing::error!(error = %e, "cannot subscribe to file changes");
                        return false;
                    }
                }
            }
        }

        let mut state = self.shared.state.lock();
        self.shared.reload_locked(&mut state);
        Shared::set_running_locked(&mut state, true);
        true
    }

    /// Stop acting on change events. The directory watch stays armed so
    /// creation and deletion are still reported.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        Shared::set_running_locked(&mut state, false);
    }

    /// Truncate the target file. The in-memory list is dropped right away
    /// only when stopped; while running the next change event does it.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        let Some(target) = state.target.as_ref() else {
            return;
        };

        let truncated = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target.path);

        match truncated {
            Ok(_) => {
                if !state.is_running {
                    state.records.clear();
                    state.version += 1;
                }
                let version = state.version;
                state.subscribers.publish(MonitorEvent::Updated {
                    is_clear: true,
                    added: None,
                    version,
                });
            }
            Err(e) => {
                tracing::error!(path = %target.path.display(), error = %e, "failed to clear log file");
            }
        }
    }

    /// Re-read the file and publish the difference, running or not
    pub fn reload(&self) {
        let mut state = self.shared.state.lock();
        self.shared.reload_locked(&mut state);
    }

    /// Feed one filesystem event into the state machine
    pub fn handle_watch_event(&self, event: WatchEvent) {
        self.shared.handle_watch_event(event);
    }

    /// New notification channel. Any number of subscribers may be attached.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        self.shared.state.lock().subscribers.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.state.lock();
        Snapshot {
            version: state.version,
            records: state.records.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().is_running
    }

    /// Last known existence of the target file
    pub fn file_exists(&self) -> bool {
        self.shared.state.lock().file_exists
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.shared.state.lock().target.as_ref().map(|t| t.path.clone())
    }

    pub fn mapping(&self) -> Option<ColumnMapping> {
        self.shared
            .state
            .lock()
            .target
            .as_ref()
            .map(|t| t.mapping.clone())
    }

    fn arm_watch(&self, path: &Path) -> Result<DirWatch, MonitorError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        DirWatch::new(dir, move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_watch_event(event);
            }
        })
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorOptions::default())
    }
}

impl Shared {
    fn handle_watch_event(&self, event: WatchEvent) {
        let mut state = self.state.lock();
        let Some(name) = state.target.as_ref().map(|t| t.file_name.clone()) else {
            return;
        };
        let is_target = |p: &Path| p.file_name() == Some(name.as_os_str());

        match event {
            WatchEvent::Changed(p) if is_target(&p) => {
                if state.is_tracking && state.watch_filter.is_some() {
                    self.reload_locked(&mut state);
                }
            }
            WatchEvent::Created(p) if is_target(&p) => {
                self.existence_event_locked(&mut state, true);
            }
            WatchEvent::Deleted(p) if is_target(&p) => {
                self.existence_event_locked(&mut state, false);
            }
            WatchEvent::Renamed { from, to } => {
                if to.as_deref().is_some_and(is_target) {
                    self.existence_event_locked(&mut state, true);
                }
                if from.as_deref().is_some_and(is_target) {
                    self.existence_event_locked(&mut state, false);
                }
            }
            _ => {}
        }
    }

    /// Backends may report one rename several times (each half, then the
    /// pair), so only a real transition is published. A file replaced in
    /// place while it already exists is just re-read.
    fn existence_event_locked(&self, state: &mut State, exists: bool) {
        match (state.file_exists, exists) {
            (true, true) => self.reload_locked(state),
            (false, false) => {}
            _ => self.update_file_state_locked(state, exists),
        }
    }

    fn update_file_state_locked(&self, state: &mut State, exists: bool) {
        tracing::debug!(exists, "target file existence changed");
        state.file_exists = exists;

        if exists {
            state.subscribers.publish(MonitorEvent::FileExistence(true));
            self.reload_locked(state);
            state.watch_filter = state.target.as_ref().map(|t| t.file_name.clone());
        } else {
            Self::set_running_locked(state, false);
            state.watch_filter = None;
            state.subscribers.publish(MonitorEvent::FileExistence(false));
        }
    }

    fn set_running_locked(state: &mut State, running: bool) {
        if state.is_running == running {
            return;
        }
        state.is_running = running;
        state.is_tracking = running;
        tracing::info!(running, "monitor run state changed");
        state.subscribers.publish(MonitorEvent::RunState(running));
    }

    fn reload_locked(&self, state: &mut State) {
        let fresh = {
            let Some(target) = state.target.as_ref() else {
                return;
            };
            read_records(
                &target.path,
                &target.mapping,
                target.splitter.as_ref(),
                self.options.charset,
            )
        };
        apply_reload(state, fresh);
    }
}

/// Diff a freshly parsed list against the held one and publish the result.
///
/// The file counts as rotated when it got shorter or the last held record no
/// longer matches the record at the same position.
fn apply_reload(state: &mut State, fresh: Vec<Record>) {
    let held = state.records.len();
    let is_clear = held > fresh.len()
        || (held > 0 && *state.records[held - 1] != fresh[held - 1]);

    if is_clear {
        state.records.clear();
    }

    let added: Vec<ArcRecord> = fresh
        .into_iter()
        .skip(state.records.len())
        .map(Arc::new)
        .collect();
    state.records.extend(added.iter().cloned());

    if is_clear || !added.is_empty() {
        state.version += 1;
    }

    tracing::debug!(is_clear, added = added.len(), total = state.records.len(), "reloaded");

    let version = state.version;
    state.subscribers.publish(MonitorEvent::Updated {
        is_clear,
        added: (!added.is_empty()).then_some(added),
        version,
    });
}
