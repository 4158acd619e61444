// SPDX-License-Identifier: Apache-2.0

//! Native file system watcher using the `notify` crate.
//!
//! Uses OS-level file system notifications:
//! - Linux: inotify
//! - macOS: FSEvents
//! - Windows: ReadDirectoryChangesW
//!
//! This is a passthrough adapter: add/remove/close delegate to the native
//! subsystem, and its notifications are converted onto the same channel
//! contract the poll watcher uses.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use notify::{
    Config, Event as NotifyEvent, EventKind as NotifyEventKind, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use tracing::warn;

use crate::bounded_channel::{self, BoundedReceiver, TrySendError};
use crate::error::{Error, Result};
use crate::event::{EventKind, PathEvent};
use crate::watcher::FileWatcher;

/// Native file system watcher using OS-level notifications.
pub struct NativeWatcher {
    /// Taken and dropped on close, which releases the native handles and
    /// closes the channels by dropping the callback's senders.
    watcher: Mutex<Option<RecommendedWatcher>>,
    events_rx: BoundedReceiver<PathEvent>,
    errors_rx: BoundedReceiver<Error>,
    closed: AtomicBool,
}

impl NativeWatcher {
    /// Create a new native watcher.
    ///
    /// Fails with [`Error::Init`] if the native notification subsystem
    /// cannot be initialized; no partial watcher is returned.
    pub fn new(channel_capacity: usize) -> Result<Self> {
        let (events_tx, events_rx) = bounded_channel::bounded(channel_capacity);
        let (errors_tx, errors_rx) = bounded_channel::bounded(channel_capacity);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if let Some(event) = convert_event(event) {
                        // The callback runs on notify's own thread and must
                        // not wait on a slow consumer.
                        if let Err(TrySendError::Full) = events_tx.try_send(event) {
                            warn!("events channel full, dropping native event");
                        }
                    }
                }
                Err(e) => {
                    let _ = errors_tx.try_send(Error::Native(e.to_string()));
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::Init(e.to_string()))?;

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            events_rx,
            errors_rx,
            closed: AtomicBool::new(false),
        })
    }
}

/// Convert a notify event to the unified event type
fn convert_event(event: NotifyEvent) -> Option<PathEvent> {
    let kind = match event.kind {
        NotifyEventKind::Create(_) => EventKind::Create,
        NotifyEventKind::Modify(notify::event::ModifyKind::Name(_)) => EventKind::Rename,
        NotifyEventKind::Modify(_) => EventKind::Write,
        NotifyEventKind::Remove(_) => EventKind::Remove,
        NotifyEventKind::Access(_) => return None, // Ignore access events
        NotifyEventKind::Other => EventKind::Other,
        NotifyEventKind::Any => EventKind::Other,
    };

    if event.paths.is_empty() {
        return None;
    }

    Some(PathEvent::new(kind, event.paths))
}

impl FileWatcher for NativeWatcher {
    fn events(&self) -> BoundedReceiver<PathEvent> {
        self.events_rx.clone()
    }

    fn errors(&self) -> BoundedReceiver<Error> {
        self.errors_rx.clone()
    }

    fn add(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock().unwrap();
        match guard.as_mut() {
            None => Err(Error::Closed),
            Some(watcher) => watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| Error::Watch(e.to_string())),
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock().unwrap();
        match guard.as_mut() {
            None => Err(Error::Closed),
            Some(watcher) => match watcher.unwatch(path) {
                Ok(()) => Ok(()),
                // Unwatching a never-watched path is a no-op, matching the
                // poll watcher's contract.
                Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) => Ok(()),
                Err(e) => Err(Error::Watch(e.to_string())),
            },
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        self.watcher.lock().unwrap().take();
        Ok(())
    }

    fn is_native(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "linux")]
        {
            "inotify"
        }
        #[cfg(target_os = "macos")]
        {
            "FSEvents"
        }
        #[cfg(target_os = "windows")]
        {
            "ReadDirectoryChangesW"
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            "native"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

    async fn collect_events(
        rx: &mut BoundedReceiver<PathEvent>,
        min_events: usize,
    ) -> Vec<PathEvent> {
        let mut events = Vec::new();
        let _ = timeout(EVENT_TIMEOUT, async {
            while events.len() < min_events {
                match rx.next().await {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
        })
        .await;
        events
    }

    #[test]
    fn test_native_watcher_create() {
        let watcher = NativeWatcher::new(64);
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_native_watcher_watch_directory() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = NativeWatcher::new(64).unwrap();

        let result = watcher.add(temp_dir.path());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_native_watcher_detects_file_create() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = NativeWatcher::new(64).unwrap();
        let mut rx = watcher.events();
        watcher.add(temp_dir.path()).unwrap();

        let file_path = temp_dir.path().join("test.log");
        File::create(&file_path).unwrap();

        let events = collect_events(&mut rx, 1).await;
        assert!(!events.is_empty(), "Should detect file creation");

        let has_create = events.iter().any(|e| e.kind == EventKind::Create);
        assert!(has_create, "Should have a create event");
    }

    #[tokio::test]
    async fn test_native_watcher_detects_file_modify() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.log");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"initial content\n").unwrap();
        file.flush().unwrap();
        drop(file);

        let watcher = NativeWatcher::new(64).unwrap();
        let mut rx = watcher.events();
        watcher.add(temp_dir.path()).unwrap();

        let mut file = fs::OpenOptions::new().append(true).open(&file_path).unwrap();
        file.write_all(b"more content\n").unwrap();
        file.flush().unwrap();
        drop(file);

        let events = collect_events(&mut rx, 1).await;
        assert!(!events.is_empty(), "Should detect file modification");

        // Some systems report create on open-for-write.
        let has_change = events
            .iter()
            .any(|e| e.kind == EventKind::Write || e.kind == EventKind::Create);
        assert!(has_change, "Should have a write or create event");
    }

    #[test]
    fn test_remove_unwatched_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = NativeWatcher::new(64).unwrap();
        watcher.remove(temp_dir.path()).unwrap();
    }

    #[test]
    fn test_close_then_operations_fail() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = NativeWatcher::new(64).unwrap();

        watcher.close().unwrap();
        assert!(matches!(watcher.close(), Err(Error::Closed)));
        assert!(matches!(watcher.add(temp_dir.path()), Err(Error::Closed)));
        assert!(matches!(watcher.remove(temp_dir.path()), Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_close_closes_channels() {
        let watcher = NativeWatcher::new(64).unwrap();
        let mut events = watcher.events();
        let mut errors = watcher.errors();

        watcher.close().unwrap();

        let drained = timeout(EVENT_TIMEOUT, async {
            while events.next().await.is_some() {}
            while errors.next().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "channels should close after close()");
    }

    #[test]
    fn test_convert_event_mapping() {
        let path = PathBuf::from("/tmp/f");

        let create = NotifyEvent::new(NotifyEventKind::Create(
            notify::event::CreateKind::File,
        ))
        .add_path(path.clone());
        assert_eq!(convert_event(create).unwrap().kind, EventKind::Create);

        let rename = NotifyEvent::new(NotifyEventKind::Modify(
            notify::event::ModifyKind::Name(notify::event::RenameMode::Both),
        ))
        .add_path(path.clone());
        assert_eq!(convert_event(rename).unwrap().kind, EventKind::Rename);

        let data = NotifyEvent::new(NotifyEventKind::Modify(
            notify::event::ModifyKind::Data(notify::event::DataChange::Content),
        ))
        .add_path(path.clone());
        assert_eq!(convert_event(data).unwrap().kind, EventKind::Write);

        let access = NotifyEvent::new(NotifyEventKind::Access(
            notify::event::AccessKind::Read,
        ))
        .add_path(path.clone());
        assert!(convert_event(access).is_none());

        // Events without paths are meaningless to consumers.
        let empty = NotifyEvent::new(NotifyEventKind::Create(
            notify::event::CreateKind::File,
        ));
        assert!(convert_event(empty).is_none());
    }

    #[test]
    fn test_native_watcher_is_native() {
        let watcher = NativeWatcher::new(64).unwrap();
        assert!(watcher.is_native());
        assert!(!watcher.backend_name().is_empty());

        #[cfg(target_os = "linux")]
        assert_eq!(watcher.backend_name(), "inotify");

        #[cfg(target_os = "macos")]
        assert_eq!(watcher.backend_name(), "FSEvents");
    }
}
