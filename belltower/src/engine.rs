//! The trigger engine: samples the clock, matches the weekly table and fires alerts.

use crate::common::{AlertKind, TriggerKey};
use crate::components::watcher::{ConfigWatcher, ReloadOutcome};
use crate::config::{Event, ScheduleConfig};
use crate::dispatch::{AlertDispatcher, Notification};
use crate::error::Result;
use crate::events::{AlertEvent, SystemEvent};
use crate::time::{same_minute, Clock, SystemClock};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Alerts already fired today.
///
/// Keys are date-qualified and everything from earlier days is pruned as soon
/// as a sample lands on a new date, so the set holds at most one day of keys.
#[derive(Debug, Default)]
pub struct TriggeredSet {
    keys: HashSet<TriggerKey>,
    current_date: Option<NaiveDate>,
}

impl TriggeredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the set to `date`. Returns how many keys were pruned if the date changed.
    pub fn roll_to(&mut self, date: NaiveDate) -> Option<usize> {
        if self.current_date == Some(date) {
            return None;
        }
        let had_date = self.current_date.replace(date).is_some();
        let before = self.keys.len();
        self.keys.retain(|key| key.date == date);
        had_date.then_some(before - self.keys.len())
    }

    /// Records `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: TriggerKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The main belltower engine.
///
/// It owns the config watcher and the triggered set and drives them from a
/// single sampling loop, so neither needs locking. Fired alerts leave the loop
/// through the dispatcher, which never blocks it.
pub struct TriggerEngine {
    clock: Arc<dyn Clock>,
    watcher: ConfigWatcher,
    dispatcher: AlertDispatcher,
    triggered: TriggeredSet,
    sample_interval: Duration,
    error_backoff: Duration,
    tick_count: u64,
    system_event_sender: broadcast::Sender<SystemEvent>,
    alert_event_sender: broadcast::Sender<AlertEvent>,
}

// Core implementation block for the sampling cycle.
impl TriggerEngine {
    /// Creates an engine that samples the system clock at the default cadence.
    pub fn new(watcher: ConfigWatcher, dispatcher: AlertDispatcher) -> Self {
        let (system_event_sender, _) = broadcast::channel(64);
        let (alert_event_sender, _) = broadcast::channel(64);
        Self {
            clock: Arc::new(SystemClock),
            watcher,
            dispatcher,
            triggered: TriggeredSet::new(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            tick_count: 0,
            system_event_sender,
            alert_event_sender,
        }
    }

    /// Replaces the clock the engine samples.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timing(mut self, sample_interval: Duration, error_backoff: Duration) -> Self {
        self.sample_interval = sample_interval;
        self.error_backoff = error_backoff;
        self
    }

    /// Runs the sampling loop until Ctrl+C.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Cannot listen for Ctrl+C, shutting down.");
            }
        })
        .await
    }

    /// Runs the sampling loop until `shutdown` completes.
    ///
    /// A failed cycle is logged and followed by a back-off pause; the loop
    /// itself only ends on shutdown.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        let started_at = self.clock.now().ok();
        info!(
            interval = ?self.sample_interval,
            config = %self.watcher.path().display(),
            "TriggerEngine starting up..."
        );
        if let Some(at) = started_at {
            self.system_event_sender
                .send(SystemEvent::EngineStarted { at })
                .ok();
        }

        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        error!(error = %e, backoff = ?self.error_backoff, "Sampling cycle failed, backing off.");
                        self.system_event_sender
                            .send(SystemEvent::SampleFailed { reason: e.to_string() })
                            .ok();
                        tokio::select! {
                            biased;
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(self.error_backoff) => {}
                        }
                        ticker.reset();
                    }
                }
            }
        }

        info!("Shutdown signal received.");
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("TriggerEngine has shut down.");
        Ok(())
    }

    /// Runs one sampling cycle and returns the keys of the alerts it fired.
    pub fn tick(&mut self) -> Result<Vec<TriggerKey>> {
        let now = self.clock.now()?;
        self.tick_count += 1;
        trace!("Tick #{} at {}.", self.tick_count, now);

        match self.watcher.check_for_changes() {
            ReloadOutcome::Unchanged => {}
            ReloadOutcome::Reloaded { events } => {
                self.system_event_sender
                    .send(SystemEvent::ConfigReloaded {
                        path: self.watcher.path().to_path_buf(),
                        events,
                    })
                    .ok();
            }
            ReloadOutcome::Failed(e) => {
                self.system_event_sender
                    .send(SystemEvent::ConfigReloadFailed {
                        path: self.watcher.path().to_path_buf(),
                        reason: e.to_string(),
                    })
                    .ok();
            }
        }

        let config = self.watcher.current();
        let fired = self.evaluate(now, &config);
        let mut keys = Vec::with_capacity(fired.len());
        for notification in fired {
            info!(
                event = %notification.key.event,
                kind = %notification.key.kind,
                at = %now.format("%H:%M"),
                "Alert fired."
            );
            self.alert_event_sender
                .send(AlertEvent {
                    key: notification.key.clone(),
                    fired_at: now,
                    text: notification.text.clone(),
                })
                .ok();
            keys.push(notification.key.clone());
            self.dispatcher.dispatch(notification);
        }
        Ok(keys)
    }

    /// Decides which alerts fire at `now` under `config`.
    ///
    /// Each returned alert is recorded in the triggered set before it is
    /// returned, so a slow or failing dispatch can never cause a re-fire.
    pub fn evaluate(&mut self, now: NaiveDateTime, config: &ScheduleConfig) -> Vec<Notification> {
        let date = now.date();
        if let Some(pruned) = self.triggered.roll_to(date) {
            debug!(%date, pruned, "Day rolled over.");
            self.system_event_sender
                .send(SystemEvent::DayRolledOver {
                    new_date: date,
                    pruned,
                })
                .ok();
        }

        let mut fired = Vec::new();
        for event in config.events_on(date.weekday()) {
            for kind in AlertKind::ALL {
                let Some(at) = event.alert_time(kind) else {
                    continue;
                };
                if !same_minute(at, now.time()) {
                    continue;
                }
                let key = TriggerKey::new(date, event.name.as_str(), kind);
                if !self.triggered.insert(key.clone()) {
                    continue;
                }
                fired.push(notification_for(config, event, kind, key));
            }
        }
        fired
    }
}

// Public API implementation block.
impl TriggerEngine {
    pub fn triggered(&self) -> &TriggeredSet {
        &self.triggered
    }

    /// The snapshot the next cycle will evaluate against, barring a reload.
    pub fn current_config(&self) -> Arc<ScheduleConfig> {
        self.watcher.current()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `AlertEvent` stream.
    pub fn subscribe_alert_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_event_sender.subscribe()
    }
}

fn notification_for(
    config: &ScheduleConfig,
    event: &Event,
    kind: AlertKind,
    key: TriggerKey,
) -> Notification {
    let (clip, repetitions) = config.sounds.clip_for(kind);
    let (banner_color, text_color) = config.message.colors_for(kind);
    Notification {
        key,
        text: event.message_for(kind),
        banner_color: banner_color.to_string(),
        text_color: text_color.to_string(),
        clip: clip.to_path_buf(),
        repetitions,
        frame_thickness: config.banner.frame_thickness,
        font: config.message.font(),
    }
}
