//! # Belltower
//!
//! A weekly-schedule alert engine. It watches the wall clock against a table
//! of recurring time windows and, at each window's start, a configurable
//! number of minutes before its end, and its end, plays a tone and raises a
//! banner.
//!
//! ## Core Concepts
//!
//! - **ScheduleConfig**: An immutable snapshot of sounds, styling and the weekly
//!   event table, loaded from JSON.
//! - **ConfigWatcher**: Reloads the snapshot when the file changes and swaps it
//!   in whole. A broken edit leaves the previous snapshot in service.
//! - **TriggerEngine**: Samples the clock every 20 seconds, matches the table at
//!   minute resolution and fires each alert at most once per day.
//! - **AlertDispatcher**: Hands every fired alert to independent playback and
//!   display units and returns at once.
//! - **InstanceGuard**: A liveness-checked pid file that keeps one engine per host.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use belltower::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let watcher = ConfigWatcher::open("/opt/belltower/config.json", "/opt/belltower");
//!     let dispatcher = AlertDispatcher::new(
//!         Arc::new(SilentTonePlayer),
//!         Arc::new(LogBanner),
//!         tokio::runtime::Handle::current(),
//!     );
//!     let mut engine = TriggerEngine::new(watcher, dispatcher);
//!
//!     let mut alerts = engine.subscribe_alert_events();
//!     tokio::spawn(async move {
//!         while let Ok(alert) = alerts.recv().await {
//!             println!("fired: {}", alert.key);
//!         }
//!     });
//!
//!     // Runs until Ctrl+C.
//!     engine.run().await
//! }
//! ```

pub const ENGINE_NAME: &str = "Belltower";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod collaborators;
pub mod common;
pub mod components;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod settings;
pub mod time;

/// A prelude module for easy importing of the most common Belltower types.
pub mod prelude {
    pub use crate::collaborators::{LogBanner, SilentTonePlayer};
    pub use crate::common::{AlertKind, TriggerKey};
    pub use crate::components::guard::InstanceGuard;
    pub use crate::components::watcher::{ConfigWatcher, ReloadOutcome};
    pub use crate::config::{Event, ScheduleConfig};
    pub use crate::dispatch::{AlertDispatcher, BannerDisplay, BannerRequest, TonePlayer};
    pub use crate::engine::{TriggerEngine, TriggeredSet};
    pub use crate::error::{BellError, Result};
    pub use crate::events::{AlertEvent, SystemEvent};
    pub use crate::settings::EngineSettings;
    pub use crate::time::{Clock, SystemClock};
}
