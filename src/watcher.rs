// SPDX-License-Identifier: Apache-2.0

//! The unified watcher contract.

use std::path::Path;

use crate::bounded_channel::BoundedReceiver;
use crate::error::{Error, Result};
use crate::event::PathEvent;

/// Trait for file system watchers.
///
/// Implementations can use native OS file system notifications or polling;
/// callers depend only on this contract and can swap strategies without code
/// changes. Change events and watcher errors are delivered on two channels
/// that stay open until the watcher is closed, and `add`/`remove` may be
/// called concurrently with draining them.
pub trait FileWatcher {
    /// Handle to the watcher's events channel.
    ///
    /// Every call returns a handle to the same underlying channel, which
    /// closes when the watcher does.
    fn events(&self) -> BoundedReceiver<PathEvent>;

    /// Handle to the watcher's errors channel, carrying runtime failures the
    /// watcher cannot resolve itself. Same lifetime contract as
    /// [`events`](FileWatcher::events).
    fn errors(&self) -> BoundedReceiver<Error>;

    /// Begin watching a path.
    ///
    /// Watching a path that does not exist yet is valid for the poll
    /// watcher; its later creation is reported as a create event. Native
    /// watchers may reject such paths.
    fn add(&self, path: &Path) -> Result<()>;

    /// Stop watching a path. Removing a path that is not currently watched
    /// is a no-op.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Stop the watcher, releasing timers and native handles and closing
    /// the events and errors channels. Returns [`Error::Closed`] on any
    /// call after the first.
    fn close(&self) -> Result<()>;

    /// Check if the watcher is using native OS notifications.
    ///
    /// Returns true for inotify/kqueue/FSEvents watchers, false for poll
    /// watchers.
    fn is_native(&self) -> bool;

    /// Get the name of the watcher backend for logging.
    fn backend_name(&self) -> &'static str;
}
