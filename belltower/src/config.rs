//! Defines the schedule snapshot the engine evaluates.
//!
//! A `ScheduleConfig` is deserialized wholesale from a JSON document and is
//! never mutated afterwards. Reloading produces a brand new snapshot, so a
//! reader holding an `Arc<ScheduleConfig>` always sees one consistent version.

use crate::common::{weekday_name, AlertKind};
use crate::error::{BellError, Result};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

/// The complete, immutable configuration for one engine generation.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub sounds: Sounds,
    pub banner: BannerStyle,
    #[serde(rename = "message_settings")]
    pub message: MessageStyle,
    #[serde(default, deserialize_with = "deserialize_schedule")]
    pub schedule: HashMap<Weekday, Vec<Event>>,
}

/// Clip identifiers and how many times each one is played in a row.
#[derive(Debug, Clone, Deserialize)]
pub struct Sounds {
    pub start: PathBuf,
    #[serde(default = "one", deserialize_with = "deserialize_repetition")]
    pub start_repetition: u32,
    pub before_end: PathBuf,
    #[serde(default = "one", deserialize_with = "deserialize_repetition")]
    pub before_end_repetition: u32,
    pub end: PathBuf,
    #[serde(default = "one", deserialize_with = "deserialize_repetition")]
    pub end_repetition: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerStyle {
    /// Width of the coloured frame, in pixels.
    pub frame_thickness: u32,
}

/// Font and colour settings for the banner text.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageStyle {
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: String,
    pub color_start: String,
    pub color_before_end: String,
    pub color_end: String,
    pub banner_start: String,
    pub banner_before_end: String,
    pub banner_end: String,
}

/// Font description handed to the banner display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub family: String,
    pub size: u32,
    pub weight: String,
}

/// A named time window on one weekday.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(deserialize_with = "deserialize_hh_mm")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "deserialize_hh_mm")]
    pub end: NaiveTime,
    #[serde(default)]
    pub alerts: Alerts,
}

/// Which alert rules are enabled for an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alerts {
    #[serde(default)]
    pub start: bool,
    /// Minutes before `end` to warn. `None` disables the rule.
    #[serde(default, deserialize_with = "deserialize_before_end")]
    pub before_end: Option<u32>,
    #[serde(default)]
    pub end: bool,
}

impl ScheduleConfig {
    /// Reads and parses the config file at `path`.
    ///
    /// Relative clip paths are resolved against `base_dir`.
    pub fn load(path: &Path, base_dir: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BellError::config(path, e))?;
        Self::from_json_str(&raw, base_dir).map_err(|e| match e {
            BellError::Config { message, .. } => BellError::config(path, message),
            other => other,
        })
    }

    /// Parses a config document already held in memory.
    pub fn from_json_str(raw: &str, base_dir: &Path) -> Result<Self> {
        let mut config: ScheduleConfig =
            serde_json::from_str(raw).map_err(|e| BellError::config("<inline>", e))?;
        config.sounds.resolve_against(base_dir);
        Ok(config)
    }

    /// The built-in snapshot used when no config can be loaded at startup.
    ///
    /// It has an empty schedule, so the engine runs but never fires.
    pub fn fallback(base_dir: &Path) -> Self {
        let mut config = Self {
            sounds: Sounds {
                start: PathBuf::from("sounds/start.wav"),
                start_repetition: 1,
                before_end: PathBuf::from("sounds/before_end.wav"),
                before_end_repetition: 1,
                end: PathBuf::from("sounds/end.wav"),
                end_repetition: 1,
            },
            banner: BannerStyle { frame_thickness: 10 },
            message: MessageStyle {
                font_family: "Arial".to_string(),
                font_size: 24,
                font_weight: "bold".to_string(),
                color_start: "white".to_string(),
                color_before_end: "white".to_string(),
                color_end: "white".to_string(),
                banner_start: "#2e7d32".to_string(),
                banner_before_end: "#f57c00".to_string(),
                banner_end: "#c62828".to_string(),
            },
            schedule: HashMap::new(),
        };
        config.sounds.resolve_against(base_dir);
        config
    }

    /// The events configured for `weekday`, in file order.
    pub fn events_on(&self, weekday: Weekday) -> &[Event] {
        self.schedule.get(&weekday).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn event_count(&self) -> usize {
        self.schedule.values().map(Vec::len).sum()
    }

    /// Every enabled alert on `weekday`, ordered by time of day.
    ///
    /// Alerts at the same minute keep evaluation order: file order of the
    /// events, then start, before_end, end.
    pub fn alerts_on(&self, weekday: Weekday) -> Vec<(NaiveTime, AlertKind, &Event)> {
        let mut alerts: Vec<_> = self
            .events_on(weekday)
            .iter()
            .flat_map(|event| {
                AlertKind::ALL
                    .into_iter()
                    .filter_map(move |kind| event.alert_time(kind).map(|at| (at, kind, event)))
            })
            .collect();
        alerts.sort_by_key(|(at, _, _)| *at);
        alerts
    }

    /// The first alert strictly after `now`'s minute, looking up to one week ahead.
    pub fn next_alert_after(
        &self,
        now: NaiveDateTime,
    ) -> Option<(NaiveDateTime, AlertKind, &Event)> {
        let minute = crate::time::to_minute(now.time());
        (0..=7).find_map(|offset| {
            let date = now.date() + chrono::Duration::days(offset);
            self.alerts_on(date.weekday())
                .into_iter()
                .find(|(at, _, _)| offset > 0 || *at > minute)
                .map(|(at, kind, event)| (date.and_time(at), kind, event))
        })
    }
}

impl Sounds {
    /// The clip and repetition count played for `kind`.
    pub fn clip_for(&self, kind: AlertKind) -> (&Path, u32) {
        match kind {
            AlertKind::Start => (&self.start, self.start_repetition),
            AlertKind::BeforeEnd => (&self.before_end, self.before_end_repetition),
            AlertKind::End => (&self.end, self.end_repetition),
        }
    }

    fn resolve_against(&mut self, base_dir: &Path) {
        for clip in [&mut self.start, &mut self.before_end, &mut self.end] {
            if clip.is_relative() {
                *clip = base_dir.join(&*clip);
            }
        }
    }
}

impl MessageStyle {
    /// `(banner colour, text colour)` for `kind`.
    pub fn colors_for(&self, kind: AlertKind) -> (&str, &str) {
        match kind {
            AlertKind::Start => (&self.banner_start, &self.color_start),
            AlertKind::BeforeEnd => (&self.banner_before_end, &self.color_before_end),
            AlertKind::End => (&self.banner_end, &self.color_end),
        }
    }

    pub fn font(&self) -> FontSpec {
        FontSpec {
            family: self.font_family.clone(),
            size: self.font_size,
            weight: self.font_weight.clone(),
        }
    }
}

impl Event {
    /// The time of day at which `kind` fires for this event, if the rule is enabled.
    ///
    /// The before-end time wraps around midnight when the offset exceeds `end`.
    pub fn alert_time(&self, kind: AlertKind) -> Option<NaiveTime> {
        match kind {
            AlertKind::Start => self.alerts.start.then_some(self.start),
            AlertKind::BeforeEnd => self
                .alerts
                .before_end
                .map(|minutes| self.end - chrono::Duration::minutes(i64::from(minutes))),
            AlertKind::End => self.alerts.end.then_some(self.end),
        }
    }

    /// The banner text announced for `kind`.
    pub fn message_for(&self, kind: AlertKind) -> String {
        match kind {
            AlertKind::Start => format!("🔔 {} starts now!", self.name),
            AlertKind::BeforeEnd => format!(
                "⚠️ {} ends in {} min",
                self.name,
                self.alerts.before_end.unwrap_or_default()
            ),
            AlertKind::End => format!("🏁 {} has ended", self.name),
        }
    }
}

// --- Deserialization helpers for serde ---

fn one() -> u32 {
    1
}

fn deserialize_repetition<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let count = u32::deserialize(deserializer)?;
    if count == 0 {
        warn!("repetition count of 0 is not allowed, playing once instead");
        return Ok(1);
    }
    Ok(count)
}

fn deserialize_before_end<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = Option::<u32>::deserialize(deserializer)?;
    Ok(minutes.filter(|m| *m > 0))
}

fn deserialize_hh_mm<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
        <D::Error as serde::de::Error>::custom(format!(
            "invalid time {raw:?}, expected HH:MM: {e}"
        ))
    })
}

fn deserialize_schedule<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<Weekday, Vec<Event>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Vec<Event>>::deserialize(deserializer)?;
    let mut schedule = HashMap::with_capacity(raw.len());
    for (day, events) in raw {
        let Ok(weekday) = day.trim().parse::<Weekday>() else {
            warn!(day = %day, "ignoring schedule entry for unknown weekday");
            continue;
        };
        let events: Vec<Event> = events
            .into_iter()
            .filter(|event| {
                let keep = !event.name.trim().is_empty();
                if !keep {
                    warn!(day = weekday_name(weekday), "ignoring event without a name");
                }
                keep
            })
            .collect();
        schedule.entry(weekday).or_insert_with(Vec::new).extend(events);
    }
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "sounds": {
            "start": "sounds/start.wav", "start_repetition": 2,
            "before_end": "/opt/bells/warn.wav",
            "end": "sounds/end.wav", "end_repetition": 0
        },
        "banner": {"frame_thickness": 12},
        "message_settings": {
            "font_family": "Arial", "font_size": 32, "font_weight": "bold",
            "color_start": "white", "color_before_end": "black", "color_end": "white",
            "banner_start": "green", "banner_before_end": "yellow", "banner_end": "red"
        },
        "schedule": {
            "Monday": [
                {"name": "Math", "start": "09:00", "end": "10:00",
                 "alerts": {"start": true, "before_end": 10, "end": true}},
                {"name": "Lunch", "start": "12:00", "end": "12:30",
                 "alerts": {"start": true, "before_end": 0}}
            ],
            "funday": [],
            "tuesday": [{"name": "", "start": "08:00", "end": "09:00", "alerts": {}}]
        }
    }"##;

    fn sample() -> ScheduleConfig {
        ScheduleConfig::from_json_str(SAMPLE, Path::new("/srv/belltower")).unwrap()
    }

    #[test]
    fn parses_full_document() {
        let config = sample();
        assert_eq!(config.banner.frame_thickness, 12);
        assert_eq!(config.message.font_size, 32);
        let monday = config.events_on(Weekday::Mon);
        assert_eq!(monday.len(), 2);
        assert_eq!(monday[0].name, "Math");
        assert_eq!(monday[0].start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(monday[0].alerts.before_end, Some(10));
    }

    #[test]
    fn repetitions_default_and_clamp_to_one() {
        let sounds = sample().sounds;
        assert_eq!(sounds.start_repetition, 2);
        assert_eq!(sounds.before_end_repetition, 1);
        assert_eq!(sounds.end_repetition, 1);
    }

    #[test]
    fn relative_clips_resolve_against_base_dir() {
        let sounds = sample().sounds;
        assert_eq!(sounds.start, PathBuf::from("/srv/belltower/sounds/start.wav"));
        assert_eq!(sounds.before_end, PathBuf::from("/opt/bells/warn.wav"));
    }

    #[test]
    fn zero_before_end_disables_the_rule() {
        let config = sample();
        let lunch = &config.events_on(Weekday::Mon)[1];
        assert_eq!(lunch.alerts.before_end, None);
        assert_eq!(lunch.alert_time(AlertKind::BeforeEnd), None);
        assert!(!lunch.alerts.end);
    }

    #[test]
    fn unknown_weekdays_and_unnamed_events_are_skipped() {
        let config = sample();
        assert_eq!(config.schedule.len(), 2);
        assert!(config.events_on(Weekday::Tue).is_empty());
        assert_eq!(config.event_count(), 2);
    }

    #[test]
    fn before_end_time_subtracts_minutes() {
        let config = sample();
        let math = &config.events_on(Weekday::Mon)[0];
        assert_eq!(
            math.alert_time(AlertKind::BeforeEnd),
            NaiveTime::from_hms_opt(9, 50, 0)
        );
    }

    #[test]
    fn before_end_wraps_past_midnight() {
        let event = Event {
            name: "Night".to_string(),
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
            alerts: Alerts {
                start: false,
                before_end: Some(10),
                end: false,
            },
        };
        assert_eq!(
            event.alert_time(AlertKind::BeforeEnd),
            NaiveTime::from_hms_opt(23, 55, 0)
        );
    }

    #[test]
    fn messages_match_alert_kind() {
        let config = sample();
        let math = &config.events_on(Weekday::Mon)[0];
        assert_eq!(math.message_for(AlertKind::Start), "🔔 Math starts now!");
        assert_eq!(math.message_for(AlertKind::BeforeEnd), "⚠️ Math ends in 10 min");
        assert_eq!(math.message_for(AlertKind::End), "🏁 Math has ended");
    }

    #[test]
    fn malformed_time_is_a_config_error() {
        let raw = SAMPLE.replace("\"09:00\"", "\"9 o'clock\"");
        let err = ScheduleConfig::from_json_str(&raw, Path::new("/")).unwrap_err();
        assert!(matches!(err, BellError::Config { .. }));
    }

    #[test]
    fn load_reports_the_file_path() {
        let err = ScheduleConfig::load(Path::new("/nonexistent/config.json"), Path::new("/"))
            .unwrap_err();
        match err {
            BellError::Config { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/config.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn alerts_on_orders_by_time() {
        let config = sample();
        let timeline: Vec<_> = config
            .alerts_on(Weekday::Mon)
            .into_iter()
            .map(|(at, kind, event)| (at.format("%H:%M").to_string(), kind, event.name.as_str()))
            .collect();
        assert_eq!(
            timeline,
            [
                ("09:00".to_string(), AlertKind::Start, "Math"),
                ("09:50".to_string(), AlertKind::BeforeEnd, "Math"),
                ("10:00".to_string(), AlertKind::End, "Math"),
                ("12:00".to_string(), AlertKind::Start, "Lunch"),
            ]
        );
    }

    #[test]
    fn next_alert_looks_ahead_into_next_week() {
        let config = sample();
        // 2024-01-01 is a Monday.
        let monday = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let (at, kind, event) = config
            .next_alert_after(monday.and_hms_opt(9, 0, 30).unwrap())
            .unwrap();
        assert_eq!(at, monday.and_hms_opt(9, 50, 0).unwrap());
        assert_eq!((kind, event.name.as_str()), (AlertKind::BeforeEnd, "Math"));

        let (at, kind, _) = config
            .next_alert_after(monday.and_hms_opt(12, 0, 0).unwrap())
            .unwrap();
        assert_eq!(at, monday.and_hms_opt(9, 0, 0).unwrap() + chrono::Duration::days(7));
        assert_eq!(kind, AlertKind::Start);

        let empty = ScheduleConfig::fallback(Path::new("/"));
        assert!(empty.next_alert_after(monday.and_hms_opt(0, 0, 0).unwrap()).is_none());
    }

    #[test]
    fn fallback_has_no_events() {
        let config = ScheduleConfig::fallback(Path::new("/srv/belltower"));
        assert_eq!(config.event_count(), 0);
        assert_eq!(
            config.sounds.end,
            PathBuf::from("/srv/belltower/sounds/end.wav")
        );
    }
}
