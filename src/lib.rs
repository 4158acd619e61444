// SPDX-License-Identifier: Apache-2.0

//! Unified file change watching.
//!
//! This crate provides two watching strategies behind one interface:
//! - **Native watching**: Uses OS-level file system notifications (inotify on Linux,
//!   FSEvents on macOS, ReadDirectoryChangesW on Windows) for immediate event detection.
//! - **Poll watching**: Falls back to periodic metadata polling for environments
//!   where native watching isn't available or reliable (e.g., NFS, network shares).
//!
//! Both implement [`FileWatcher`]: paths are registered with `add`, change
//! events arrive on the `events` channel, and failures the watcher cannot
//! resolve itself arrive on the `errors` channel, so either strategy can be
//! used interchangeably in your code.
//!
//! The recommended approach is to use `auto` mode which attempts native
//! watching first and falls back to polling if it fails.

pub mod bounded_channel;

mod error;
mod event;
mod native;
mod poll;
mod watcher;

pub use error::{Error, Result};
pub use event::{EventKind, PathEvent};
pub use native::NativeWatcher;
pub use poll::PollWatcher;
pub use watcher::FileWatcher;

use std::time::Duration;

use tracing::{info, warn};

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Automatically select the best watching strategy.
    /// Tries native watching first, falls back to polling on failure.
    #[default]
    Auto,
    /// Force native file system watching (inotify/kqueue/FSEvents).
    /// Will fail if native watching is not supported.
    Native,
    /// Force polling mode. Use this for network file systems (NFS)
    /// or when native watching is unreliable.
    Poll,
}

impl std::str::FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(WatchMode::Auto),
            "native" => Ok(WatchMode::Native),
            "poll" | "polling" => Ok(WatchMode::Poll),
            _ => Err(format!(
                "Invalid watch mode '{}'. Valid options: auto, native, poll",
                s
            )),
        }
    }
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Watch mode: auto, native, or poll
    pub mode: WatchMode,
    /// Interval between metadata polls when using poll mode
    pub poll_interval: Duration,
    /// Capacity of the events and errors channels; a full events channel
    /// applies backpressure to the poll loop rather than dropping
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(100),
            channel_capacity: 64,
        }
    }
}

/// Create a watcher based on the configuration.
///
/// In `Auto` mode, this tries native watching first and falls back to polling
/// if native watching fails to initialize. Poll watchers start their poll
/// loop at construction, so this must be called within a tokio runtime.
pub fn create_watcher(config: &WatcherConfig) -> Result<Box<dyn FileWatcher + Send + Sync>> {
    match config.mode {
        WatchMode::Native => {
            let watcher = NativeWatcher::new(config.channel_capacity)?;
            Ok(Box::new(watcher))
        }
        WatchMode::Poll => {
            let watcher = PollWatcher::new(config.poll_interval, config.channel_capacity);
            Ok(Box::new(watcher))
        }
        WatchMode::Auto => {
            // Try native first
            match NativeWatcher::new(config.channel_capacity) {
                Ok(watcher) => {
                    info!("Using native file system watcher");
                    Ok(Box::new(watcher))
                }
                Err(e) => {
                    warn!(
                        "Native file watching unavailable ({}), falling back to polling",
                        e
                    );
                    let watcher =
                        PollWatcher::new(config.poll_interval, config.channel_capacity);
                    Ok(Box::new(watcher))
                }
            }
        }
    }
}
