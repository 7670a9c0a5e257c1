//! Defines the event types broadcast by the trigger engine.
//!
//! Subscribers use these to observe what the engine decided without being
//! part of the sampling loop. Nothing in the engine waits on a subscriber.

use crate::common::TriggerKey;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

/// Events related to the lifecycle and state of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine's `run` loop begins.
    EngineStarted { at: NaiveDateTime },
    /// Fired once when the engine's `run` loop is about to exit.
    EngineShutdown,
    /// A changed config file was loaded and is now being served.
    ConfigReloaded { path: PathBuf, events: usize },
    /// A changed config file could not be loaded; the previous snapshot stays.
    ConfigReloadFailed { path: PathBuf, reason: String },
    /// The calendar date changed and older trigger keys were pruned.
    DayRolledOver { new_date: NaiveDate, pruned: usize },
    /// A cycle failed and the loop is backing off.
    SampleFailed { reason: String },
}

/// Fired once for every alert the engine hands to the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub key: TriggerKey,
    pub fired_at: NaiveDateTime,
    pub text: String,
}
