use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::event::{AccessKind, AccessMode, EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::trace;

use crate::watch::{WatchBackend, WatchError, WatchEvent, WatchId, WatchPoll};

/// [`WatchBackend`] over the platform's native file notification API.
///
/// Each file is watched through its parent directory so editors that save by
/// writing a temporary file and renaming it over the original keep firing.
pub struct NotifyBackend {
    watcher: Mutex<RecommendedWatcher>,
    state: Mutex<Subscriptions>,
    events: Receiver<notify::Result<notify::Event>>,
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    directories: HashMap<PathBuf, usize>,
    files: HashMap<PathBuf, Vec<WatchId>>,
}

impl Subscriptions {
    fn decode(&self, event: &notify::Event, out: &mut Vec<WatchEvent>) {
        if !is_content_change(&event.kind) {
            trace!(kind = ?event.kind, "ignoring filesystem event");
            return;
        }
        for path in &event.paths {
            let Some(ids) = self.files.get(path) else {
                trace!(path = %path.display(), "change to unwatched file");
                continue;
            };
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            out.extend(ids.iter().map(|&id| WatchEvent::Changed {
                id,
                name: name.clone(),
            }));
        }
    }
}

/// Whether `kind` means the file now holds a complete new version.
///
/// inotify reports a close after every write, so on Linux partial writes
/// (`Modify(Data)`) are ignored and only close-after-write and renames onto
/// the path count. Other backends emit no close events and fall back to
/// creation and data changes.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(_)) => true,
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any) => !EMITS_CLOSE_EVENTS,
        _ => false,
    }
}

const EMITS_CLOSE_EVENTS: bool = cfg!(any(target_os = "linux", target_os = "android"));

impl NotifyBackend {
    pub fn new() -> Result<Self, WatchError> {
        let (sender, events) = crossbeam_channel::unbounded();
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let _ = sender.send(result);
        })
        .map_err(|err| WatchError::Init(Box::new(err)))?;
        Ok(Self {
            watcher: Mutex::new(watcher),
            state: Mutex::new(Subscriptions::default()),
            events,
        })
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(&self, path: &Path) -> Result<WatchId, WatchError> {
        let subscribe_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            WatchError::Subscribe {
                path: path.to_path_buf(),
                source,
            }
        };
        let file = fs::canonicalize(path).map_err(|err| subscribe_error(Box::new(err)))?;
        if !file.is_file() {
            return Err(subscribe_error(Box::new(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ))));
        }
        let directory = file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                subscribe_error(Box::new(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "file has no parent directory",
                )))
            })?;

        let mut state = self.state.lock();
        if !state.directories.contains_key(&directory) {
            self.watcher
                .lock()
                .watch(&directory, RecursiveMode::NonRecursive)
                .map_err(|err| subscribe_error(Box::new(err)))?;
            trace!(directory = %directory.display(), "watching directory");
        }
        *state.directories.entry(directory).or_insert(0) += 1;

        let id = WatchId::new(state.next_id);
        state.next_id += 1;
        state.files.entry(file).or_default().push(id);
        Ok(id)
    }

    fn wait(&self, timeout: Duration) -> WatchPoll {
        let first = match self.events.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return WatchPoll::Idle,
            Err(RecvTimeoutError::Disconnected) => return WatchPoll::Closed,
        };

        let state = self.state.lock();
        let mut decoded = Vec::new();
        for result in std::iter::once(first).chain(self.events.try_iter()) {
            match result {
                Ok(event) => state.decode(&event, &mut decoded),
                Err(err) => decoded.push(WatchEvent::Malformed {
                    reason: err.to_string(),
                }),
            }
        }

        if decoded.is_empty() {
            WatchPoll::Idle
        } else {
            WatchPoll::Ready(decoded)
        }
    }
}
