//! Coarse calendar-hour age computation.
//!
//! Ages are measured in a flattened calendar unit that treats every month as
//! exactly 30 days: `((year * 12 + month) * 30 + day) * 24 + hour`. Both "now"
//! and the file's last-write timestamp are flattened the same way and the
//! difference in hours is compared against the rule threshold. This is not
//! calendar-accurate (a 28- or 31-day month boundary shifts the measured age
//! by up to two days) but deletion-trigger parity with existing deployments
//! requires reproducing it exactly. Do not "fix" this to a real duration
//! subtraction without a coordinated policy change.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};

/// Flatten a local timestamp into coarse hours since the calendar origin.
#[must_use]
pub fn coarse_hours(ts: &DateTime<Local>) -> i64 {
    let months = i64::from(ts.year()) * 12 + i64::from(ts.month());
    let days = months * 30 + i64::from(ts.day());
    days * 24 + i64::from(ts.hour())
}

/// Whether a file last written at `last_write` has exceeded `max_age_hours`
/// as of `now`. The threshold is exclusive: a file exactly at the limit stays.
#[must_use]
pub fn is_stale(last_write: SystemTime, now: DateTime<Local>, max_age_hours: i64) -> bool {
    let written: DateTime<Local> = last_write.into();
    coarse_hours(&now) - coarse_hours(&written) > max_age_hours
}
