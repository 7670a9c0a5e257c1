//! Single-instance coordination through a liveness-checked pid file.

use crate::error::{BellError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ensures only one engine runs per host.
///
/// The lock record is a single line holding the owner's process id. A record
/// naming a dead process is stale and gets taken over. Anything that prevents
/// checking ownership is treated as "safe to proceed" so a platform quirk can
/// never block startup.
///
/// Process liveness is only checked on Unix. Elsewhere every existing record
/// counts as stale, so the guard catches two engines racing to create the
/// record but not a second engine started later.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    pid: u32,
    held: bool,
}

impl InstanceGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_pid(path, std::process::id())
    }

    /// Builds a guard that claims the lock on behalf of `pid`.
    pub fn with_pid(path: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            path: path.into(),
            pid,
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tries to take the lock. Returns `false` only when another live process owns it.
    pub fn acquire(&mut self) -> bool {
        match self.record() {
            Ok(Record::Owner(owner)) if owner != self.pid && is_pid_alive(owner) => {
                info!(
                    path = %self.path.display(),
                    pid = owner,
                    "Another instance is already running."
                );
                return false;
            }
            Ok(Record::Owner(owner)) if owner != self.pid => {
                info!(path = %self.path.display(), pid = owner, "Taking over stale lock.");
            }
            Ok(Record::Absent) => return self.claim_fresh(),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Cannot verify lock ownership, proceeding anyway.");
            }
        }

        self.acquire_by_overwrite()
    }

    /// Publishes a new record only if none exists, so of two engines starting
    /// together exactly one wins.
    fn claim_fresh(&mut self) -> bool {
        match self.link_record() {
            Ok(()) => {
                self.held = true;
                debug!(path = %self.path.display(), pid = self.pid, "Lock acquired.");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(
                    path = %self.path.display(),
                    "Another instance claimed the lock first."
                );
                false
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cannot create lock record atomically, writing it directly."
                );
                self.acquire_by_overwrite()
            }
        }
    }

    fn acquire_by_overwrite(&mut self) -> bool {
        match self.overwrite_record() {
            Ok(()) => {
                self.held = true;
                debug!(path = %self.path.display(), pid = self.pid, "Lock acquired.");
            }
            Err(e) => warn!(error = %e, "Cannot write lock record, proceeding without it."),
        }
        true
    }

    /// Removes the lock record. Safe to call any number of times.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Lock released."),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not remove lock file."),
        }
    }

    fn record(&self) -> Result<Record> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Record::Absent),
            Err(e) => return Err(BellError::lock(&self.path, e)),
        };
        match raw.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Ok(Record::Owner(pid)),
            _ => {
                warn!(path = %self.path.display(), "Ignoring unreadable lock record.");
                Ok(Record::Unreadable)
            }
        }
    }

    /// Writes the record to a private file and hard-links it into place. The
    /// link fails with `AlreadyExists` if any record appeared in the meantime,
    /// and readers never observe a half-written record.
    fn link_record(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = self.staging_path();
        std::fs::write(&staging, format!("{}\n", self.pid))?;
        let linked = std::fs::hard_link(&staging, &self.path);
        if let Err(e) = std::fs::remove_file(&staging) {
            debug!(path = %staging.display(), error = %e, "Could not remove staging record.");
        }
        linked
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "belltower.lock".to_string());
        self.path.with_file_name(format!(".{name}.{}", self.pid))
    }

    fn overwrite_record(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BellError::lock(&self.path, e))?;
        }
        std::fs::write(&self.path, format!("{}\n", self.pid))
            .map_err(|e| BellError::lock(&self.path, e))
    }
}

/// What the lock file currently says.
enum Record {
    Absent,
    Unreadable,
    Owner(u32),
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether `pid` names a running process.
#[cfg(unix)]
pub fn is_pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    // EPERM means the process exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Liveness cannot be checked off Unix, so every record is treated as stale
/// and a running engine does not stop a second one from starting.
#[cfg(not(unix))]
pub fn is_pid_alive(_pid: u32) -> bool {
    false
}
