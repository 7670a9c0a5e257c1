//! Contains the small identity types shared by the engine and its components.
//!
//! An alert is identified by the event it belongs to, the moment within that
//! event (`AlertKind`) and the calendar day it fired on. Using distinct types
//! keeps the deduplication logic honest about what "the same alert" means.

use chrono::{NaiveDate, Weekday};
use std::fmt;

/// One of the three moments within an event that can raise a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertKind {
    Start,
    BeforeEnd,
    End,
}

impl AlertKind {
    /// The fixed evaluation order within a single event.
    pub const ALL: [AlertKind; 3] = [AlertKind::Start, AlertKind::BeforeEnd, AlertKind::End];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Start => "start",
            AlertKind::BeforeEnd => "before_end",
            AlertKind::End => "end",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The deduplication identity for one alert kind of one event on one day.
///
/// The key is date-qualified so that entries from earlier days can be pruned
/// and the same weekday next week fires again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub event: String,
    pub kind: AlertKind,
}

impl TriggerKey {
    pub fn new(date: NaiveDate, event: impl Into<String>, kind: AlertKind) -> Self {
        Self {
            date,
            weekday: chrono::Datelike::weekday(&date),
            event: event.into(),
            kind,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}-{}",
            self.date,
            weekday_name(self.weekday),
            self.event,
            self.kind
        )
    }
}

/// Full English weekday name, the form used as schedule keys.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
