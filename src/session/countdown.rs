use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Minutes and seconds left. Partial seconds round up, so 00:00 is only
/// shown once the deadline has actually passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeLeft {
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeLeft {
    pub fn from_millis(millis: i64) -> Self {
        if millis <= 0 {
            return Self::default();
        }
        let total_seconds = (millis + 999) / 1_000;
        Self {
            minutes: (total_seconds / 60) as u32,
            seconds: (total_seconds % 60) as u32,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.minutes == 0 && self.seconds == 0
    }

    pub fn total_seconds(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline: DateTime<Utc>,
}

impl Countdown {
    pub fn new(start: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            deadline: start + chrono::Duration::minutes(i64::from(duration_minutes)),
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn remaining_millis(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_milliseconds()
    }

    pub fn time_left(&self, now: DateTime<Utc>) -> TimeLeft {
        TimeLeft::from_millis(self.remaining_millis(now))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_millis(now) <= 0
    }

    pub fn is_almost_done(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let remaining = self.remaining_millis(now);
        remaining > 0 && (remaining as u128) < threshold.as_millis()
    }
}
