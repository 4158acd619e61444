// SPDX-License-Identifier: Apache-2.0

//! Change events delivered to watcher consumers.

use std::path::PathBuf;

/// Kind of change observed on a watched path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Path was created
    Create,
    /// Path's contents or metadata changed
    Write,
    /// Path was removed/deleted
    Remove,
    /// Path was renamed (reported by native watchers, which can observe the
    /// old and new paths; the poll watcher sees a remove plus a create)
    Rename,
    /// Catch-all for other native events
    Other,
}

/// A file system change event
#[derive(Debug, Clone)]
pub struct PathEvent {
    /// The kind of event
    pub kind: EventKind,
    /// The path(s) affected by the event. A rename carries the old and new
    /// paths; every other kind carries exactly one path.
    pub paths: Vec<PathBuf>,
}

impl PathEvent {
    pub fn new(kind: EventKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }

    pub fn create(path: PathBuf) -> Self {
        Self::new(EventKind::Create, vec![path])
    }

    pub fn write(path: PathBuf) -> Self {
        Self::new(EventKind::Write, vec![path])
    }

    pub fn remove(path: PathBuf) -> Self {
        Self::new(EventKind::Remove, vec![path])
    }

    pub fn rename(from: PathBuf, to: PathBuf) -> Self {
        Self::new(EventKind::Rename, vec![from, to])
    }
}
