//! Contains the long-lived building blocks the engine coordinates.
//!
//! `ConfigWatcher` keeps the schedule snapshot fresh and `InstanceGuard`
//! keeps a host down to one running engine. The `TriggerEngine` owns the
//! watcher; the guard is held by the daemon's `main` until shutdown.

pub mod guard;
pub mod watcher;
