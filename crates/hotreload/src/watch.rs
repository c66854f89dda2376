use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// How long a single wait on the watch backend may block before the loop
/// re-checks its shutdown token.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Identity returned by a watch subscription. Unique per subscription, even
/// when two subscriptions name the same file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl WatchId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Decoded notification from a watch backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched file was written, created, or replaced.
    Changed { id: WatchId, name: Option<String> },
    /// The backend produced something it could not decode into an identity.
    Malformed { reason: String },
}

/// Result of a single bounded wait.
#[derive(Debug)]
pub enum WatchPoll {
    Idle,
    Ready(Vec<WatchEvent>),
    Closed,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialise filesystem watcher")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("cannot watch {path}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Source of file change notifications.
///
/// `subscribe` may be called while another thread is blocked in `wait`.
pub trait WatchBackend: Send + Sync {
    fn subscribe(&self, path: &Path) -> Result<WatchId, WatchError>;

    /// Blocks for at most `timeout` waiting for events.
    fn wait(&self, timeout: Duration) -> WatchPoll;
}

/// Cooperative cancellation flag shared between the window loop, the signal
/// handler, and the watch thread.
#[derive(Clone, Debug, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
