use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::registry::{ReloadOutcome, ResourceRegistry};
use crate::resource::ResourceLoader;
use crate::watch::{ShutdownToken, WatchBackend, WatchEvent, WatchId, WatchPoll};

/// Result of one bounded wait on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Idle,
    /// Events arrived; the count is the number of successful reloads.
    Dispatched(usize),
    Closed,
}

/// Drains watch events and forwards them to the registry.
pub struct WatchLoop<L: ResourceLoader> {
    registry: Arc<ResourceRegistry<L>>,
    backend: Arc<dyn WatchBackend>,
    interval: Duration,
}

impl<L: ResourceLoader> WatchLoop<L> {
    pub fn new(registry: Arc<ResourceRegistry<L>>, interval: Duration) -> Self {
        let backend = registry.watch_backend();
        Self {
            registry,
            backend,
            interval,
        }
    }

    pub fn tick(&self) -> Tick {
        match self.backend.wait(self.interval) {
            WatchPoll::Idle => Tick::Idle,
            WatchPoll::Closed => Tick::Closed,
            WatchPoll::Ready(events) => Tick::Dispatched(self.dispatch(events)),
        }
    }

    /// Loops until `token` is cancelled or the backend closes.
    pub fn run(&self, token: &ShutdownToken) {
        debug!(interval_ms = self.interval.as_millis() as u64, "watch loop started");
        while !token.is_cancelled() {
            if self.tick() == Tick::Closed {
                warn!("watch backend closed; hot reload disabled");
                break;
            }
        }
        debug!("watch loop stopped");
    }

    fn dispatch(&self, events: Vec<WatchEvent>) -> usize {
        // A single save often produces several events for the same file.
        let mut pending: Vec<WatchId> = Vec::new();
        for event in events {
            match event {
                WatchEvent::Changed { id, name } => {
                    debug!(watch = %id, name = name.as_deref().unwrap_or("?"), "file changed");
                    if !pending.contains(&id) {
                        pending.push(id);
                    }
                }
                WatchEvent::Malformed { reason } => {
                    warn!(%reason, "skipping malformed watch event");
                }
            }
        }

        let mut reloaded = 0;
        for id in pending {
            match self.registry.reload_watched(id) {
                Ok(ReloadOutcome::Reloaded { handle, generation }) => {
                    info!(binding = %handle, generation, "reloaded");
                    reloaded += 1;
                }
                Ok(ReloadOutcome::Skipped(handle)) => {
                    debug!(binding = %handle, "auto reload disabled; ignoring change");
                }
                Ok(ReloadOutcome::Unknown) => {
                    warn!(watch = %id, "event for unknown watch identity");
                }
                Err(err) => {
                    error!(error = %err, "reload failed; keeping previous content");
                }
            }
        }
        reloaded
    }
}

/// Background thread running a [`WatchLoop`].
pub struct FileWatchService {
    token: ShutdownToken,
    handle: Option<JoinHandle<()>>,
}

impl FileWatchService {
    pub fn spawn<L>(
        registry: Arc<ResourceRegistry<L>>,
        token: ShutdownToken,
        interval: Duration,
    ) -> io::Result<Self>
    where
        L: ResourceLoader + 'static,
    {
        let watch_loop = WatchLoop::new(registry, interval);
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name("shaderlive-watch".into())
            .spawn(move || watch_loop.run(&thread_token))?;
        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    pub fn token(&self) -> &ShutdownToken {
        &self.token
    }

    /// Cancels the loop and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("watch thread panicked");
            }
        }
    }
}

impl Drop for FileWatchService {
    fn drop(&mut self) {
        self.stop();
    }
}
