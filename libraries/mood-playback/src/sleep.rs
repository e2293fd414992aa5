//! Sleep timer: pause playback after a countdown

use crate::events::SleepTimerStatus;

/// Counts down once per second and fires exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepTimer {
    total_secs: u32,
    remaining_secs: u32,
}

impl SleepTimer {
    pub fn new(total_secs: u32) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
        }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(minutes.saturating_mul(60))
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// One second passed; true when the timer has just expired
    pub fn tick(&mut self) -> bool {
        if self.remaining_secs <= 1 {
            self.remaining_secs = 0;
            true
        } else {
            self.remaining_secs -= 1;
            false
        }
    }

    /// Remaining time as `m:ss`
    pub fn format_remaining(&self) -> String {
        format!("{}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    pub fn status(&self) -> SleepTimerStatus {
        SleepTimerStatus {
            total_secs: self.total_secs,
            remaining_secs: self.remaining_secs,
        }
    }
}
