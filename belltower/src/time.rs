//! Wall-clock sampling.
//!
//! The engine never reads the system clock directly; it asks a `Clock`, which
//! lets tests drive the engine through simulated days.

use crate::error::{BellError, Result};
use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};

/// A source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<NaiveDateTime>;
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<NaiveDateTime> {
        let now = Local::now().naive_local();
        // A clock set before the epoch is almost certainly broken.
        if now.and_utc().timestamp() < 0 {
            return Err(BellError::TimeSample(format!(
                "local clock reports {now}, which is before 1970"
            )));
        }
        Ok(now)
    }
}

/// Truncates a time of day to whole-minute resolution.
pub fn to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Whether two times of day fall in the same wall-clock minute.
pub fn same_minute(a: NaiveTime, b: NaiveTime) -> bool {
    to_minute(a) == to_minute(b)
}
