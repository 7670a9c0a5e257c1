//! Watches the schedule config file and publishes fresh snapshots.

use crate::config::ScheduleConfig;
use crate::error::BellError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What the backing file looked like when it was last inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceMarker {
    modified: Option<SystemTime>,
    len: u64,
}

impl SourceMarker {
    fn read(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// The result of one `check_for_changes` call.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// The file has not changed since the last successful load.
    Unchanged,
    /// A new snapshot is being served.
    Reloaded { events: usize },
    /// The file changed but could not be loaded. The previous snapshot stays.
    Failed(BellError),
}

/// Serves the latest good `ScheduleConfig` and reloads it when the file changes.
///
/// Snapshots are published through a `watch` channel, so a reload replaces the
/// whole `Arc` in one step and readers never see a half-updated config.
pub struct ConfigWatcher {
    path: PathBuf,
    base_dir: PathBuf,
    marker: Option<SourceMarker>,
    /// Marker of the last file state that failed to load. `Some(None)` means
    /// the file was missing.
    failed_marker: Option<Option<SourceMarker>>,
    snapshot: watch::Sender<Arc<ScheduleConfig>>,
}

impl ConfigWatcher {
    /// Loads the config at `path`, falling back to the built-in defaults if
    /// the initial load fails.
    pub fn open(path: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_dir = base_dir.into();
        let marker = SourceMarker::read(&path);
        let (config, marker) = match ScheduleConfig::load(&path, &base_dir) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    events = config.event_count(),
                    "Loaded schedule config."
                );
                (config, marker)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not load schedule config, running with built-in defaults."
                );
                (ScheduleConfig::fallback(&base_dir), None)
            }
        };
        let (snapshot, _) = watch::channel(Arc::new(config));
        Self {
            path,
            base_dir,
            marker,
            failed_marker: None,
            snapshot,
        }
    }

    /// The latest successfully loaded snapshot.
    pub fn current(&self) -> Arc<ScheduleConfig> {
        self.snapshot.borrow().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compares the file's modification marker and reloads it if it changed.
    ///
    /// A failed reload is remembered so the same broken file is not re-parsed
    /// on every cycle; the next edit triggers a fresh attempt.
    pub fn check_for_changes(&mut self) -> ReloadOutcome {
        let observed = SourceMarker::read(&self.path);
        if observed == self.marker || self.failed_marker == Some(observed) {
            return ReloadOutcome::Unchanged;
        }

        debug!(path = %self.path.display(), "Config file changed, reloading.");
        match ScheduleConfig::load(&self.path, &self.base_dir) {
            Ok(config) => {
                let events = config.event_count();
                self.snapshot.send_replace(Arc::new(config));
                self.marker = observed;
                self.failed_marker = None;
                info!(path = %self.path.display(), events, "Reloaded schedule config.");
                ReloadOutcome::Reloaded { events }
            }
            Err(e) => {
                self.failed_marker = Some(observed);
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Config reload failed, keeping the previous schedule."
                );
                ReloadOutcome::Failed(e)
            }
        }
    }
}
