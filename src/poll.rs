// SPDX-License-Identifier: Apache-2.0

//! Poll-based file watcher for environments where native file system
//! notifications are unavailable or unreliable (e.g., NFS and other network
//! file systems).
//!
//! Change events are synthesized by re-reading path metadata on a fixed
//! interval and diffing it against the previously observed state. The poll
//! loop runs as one background task per watcher, started at construction,
//! while caller threads add and remove paths and drain the channels.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::bounded_channel::{self, BoundedReceiver, BoundedSender};
use crate::error::{Error, Result};
use crate::event::PathEvent;
use crate::watcher::FileWatcher;

/// Observed metadata of an existing path
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileState {
    /// File size in bytes
    size: u64,
    /// Last modification time, where the platform reports one
    modified: Option<SystemTime>,
    /// Permission bits
    permissions: fs::Permissions,
}

impl FileState {
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            permissions: metadata.permissions(),
        }
    }
}

/// A watched path's last-known state.
///
/// `Absent` covers both "not yet observed to exist" and "observed as
/// removed"; it carries no metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathState {
    Absent,
    Present(FileState),
}

impl PathState {
    /// Observe a path's current state. A missing path is a valid
    /// observation, not an error; any other stat failure is returned for
    /// the caller to surface and retry.
    fn observe(path: &Path) -> io::Result<Self> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(PathState::Present(FileState::from_metadata(&metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PathState::Absent),
            Err(e) => Err(e),
        }
    }

    /// Observe for `add`, absorbing stat failures as `Absent`; a path that
    /// cannot be observed yet is simply not there yet.
    fn observe_lenient(path: &Path) -> Self {
        Self::observe(path).unwrap_or(PathState::Absent)
    }
}

/// Classify a state transition, if it is one worth reporting.
fn classify(prior: &PathState, observed: &PathState, path: &Path) -> Option<PathEvent> {
    match (prior, observed) {
        (PathState::Absent, PathState::Absent) => None,
        (PathState::Absent, PathState::Present(_)) => Some(PathEvent::create(path.to_path_buf())),
        (PathState::Present(a), PathState::Present(b)) if a != b => {
            Some(PathEvent::write(path.to_path_buf()))
        }
        (PathState::Present(_), PathState::Present(_)) => None,
        (PathState::Present(_), PathState::Absent) => Some(PathEvent::remove(path.to_path_buf())),
    }
}

/// Registry of watched paths, shared between the watcher handle and the
/// poll loop task. The lock is never held across an await point.
type WatchSet = Arc<Mutex<HashMap<PathBuf, PathState>>>;

/// Send failure modes when racing an emit against shutdown.
#[derive(Debug)]
enum EmitError {
    /// The watcher was closed while the send was in flight.
    Cancelled,
    /// Every receiver handle was dropped.
    ChannelClosed,
}

/// Poll-based file watcher.
///
/// Watches individual paths, including paths that do not exist yet. Each
/// tick re-stats every watched path and emits create/write/remove events
/// for observed transitions.
pub struct PollWatcher {
    watches: WatchSet,
    events_rx: BoundedReceiver<PathEvent>,
    errors_rx: BoundedReceiver<Error>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl PollWatcher {
    /// Create a poll watcher ticking at `poll_interval` and start its poll
    /// loop. Must be called from within a tokio runtime.
    pub fn new(poll_interval: Duration, channel_capacity: usize) -> Self {
        let (events_tx, events_rx) = bounded_channel::bounded(channel_capacity);
        let (errors_tx, errors_rx) = bounded_channel::bounded(channel_capacity);
        let watches: WatchSet = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let loop_watches = Arc::clone(&watches);
        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            poll_loop(
                loop_watches,
                events_tx,
                errors_tx,
                poll_interval,
                loop_cancel,
            )
            .await;
        });

        Self {
            watches,
            events_rx,
            errors_rx,
            cancel,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl FileWatcher for PollWatcher {
    fn events(&self) -> BoundedReceiver<PathEvent> {
        self.events_rx.clone()
    }

    fn errors(&self) -> BoundedReceiver<Error> {
        self.errors_rx.clone()
    }

    fn add(&self, path: &Path) -> Result<()> {
        self.check_open()?;
        if path.as_os_str().is_empty() {
            return Err(Error::Watch("cannot watch an empty path".into()));
        }

        // Re-adding a watched path replaces its entry, resetting the
        // tracked state to a fresh observation.
        let state = PathState::observe_lenient(path);
        self.watches
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), state);
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.check_open()?;
        self.watches.lock().unwrap().remove(path);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        self.cancel.cancel();
        self.watches.lock().unwrap().clear();
        Ok(())
    }

    fn is_native(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}

impl Drop for PollWatcher {
    fn drop(&mut self) {
        // Safety net for watchers dropped without close(); cancelling an
        // already-cancelled token is a no-op.
        self.cancel.cancel();
    }
}

async fn poll_loop(
    watches: WatchSet,
    events_tx: BoundedSender<PathEvent>,
    errors_tx: BoundedSender<Error>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        select! {
            _ = interval.tick() => {
                if let Err(e) = tick(&watches, &events_tx, &errors_tx, &cancel).await {
                    debug!("poll loop stopping: {:?}", e);
                    break;
                }
            }
            _ = cancel.cancelled() => {
                debug!("poll watcher cancelled");
                break;
            }
        }
    }
    // events_tx and errors_tx drop here, closing both channels.
}

/// One re-stat-and-diff pass over the watch set.
async fn tick(
    watches: &WatchSet,
    events_tx: &BoundedSender<PathEvent>,
    errors_tx: &BoundedSender<Error>,
    cancel: &CancellationToken,
) -> std::result::Result<(), EmitError> {
    // Stable view of the registry for this tick. Paths added concurrently
    // may or may not be seen until the next tick; paths removed mid-tick
    // are re-checked under the lock below.
    let paths: Vec<PathBuf> = watches.lock().unwrap().keys().cloned().collect();
    trace!(watched = paths.len(), "poll tick");

    for path in paths {
        let observed = match PathState::observe(&path) {
            Ok(state) => state,
            Err(source) => {
                // Transient stat failure: the stored snapshot is left
                // untouched and the path is retried on the next tick.
                send_with_cancellation(errors_tx, Error::Stat { path, source }, cancel).await?;
                continue;
            }
        };

        let event = {
            let mut watches = watches.lock().unwrap();
            match watches.get_mut(&path) {
                // Removed while this tick was in flight; nothing to report.
                None => continue,
                Some(entry) => {
                    let event = classify(entry, &observed, &path);
                    *entry = observed;
                    event
                }
            }
        };

        if let Some(event) = event {
            debug!(kind = ?event.kind, path = %path.display(), "change detected");
            send_with_cancellation(events_tx, event, cancel).await?;
        }
    }

    Ok(())
}

/// Send an item, racing the send against watcher shutdown so a blocked
/// send never outlives close().
async fn send_with_cancellation<T>(
    tx: &BoundedSender<T>,
    item: T,
    cancel: &CancellationToken,
) -> std::result::Result<(), EmitError> {
    select! {
        result = tx.send(item) => match result {
            Ok(()) => Ok(()),
            Err(_) => Err(EmitError::ChannelClosed),
        },
        _ = cancel.cancelled() => Err(EmitError::Cancelled),
    }
}
