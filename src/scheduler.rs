//! Decides when work is due. The scheduler never touches the remote session;
//! its actions only enqueue jobs (or, for the hourly clear, drop them).

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use tracing::debug;

use crate::error::KeeperError;

/// One reading of both clocks. Daily and hourly slots follow the wall clock;
/// fixed intervals follow the monotonic one, so clock changes do not stall them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub wall: NaiveDateTime,
    pub mono: Instant,
}

impl Now {
    pub fn read() -> Self {
        Self {
            wall: Local::now().naive_local(),
            mono: Instant::now(),
        }
    }
}

/// When an entry runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    At(NaiveDateTime),
    After(Instant),
    Never,
}

impl Due {
    pub fn reached(&self, now: Now) -> bool {
        match *self {
            Due::At(at) => at <= now.wall,
            Due::After(after) => after <= now.mono,
            Due::Never => false,
        }
    }

    /// Wall-clock estimate, for logs.
    pub fn to_wall(self, now: Now) -> Option<NaiveDateTime> {
        match self {
            Due::At(at) => Some(at),
            Due::After(after) => TimeDelta::from_std(after.saturating_duration_since(now.mono))
                .ok()
                .and_then(|delta| now.wall.checked_add_signed(delta)),
            Due::Never => None,
        }
    }
}

/// When a registration fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once a day at a wall-clock time.
    Daily(NaiveTime),
    /// Once an hour at `minute:second` past the hour.
    Hourly { minute: u32, second: u32 },
    /// Every interval, measured from the previous run.
    Every(Duration),
}

impl Cadence {
    /// Parse `HH:MM`.
    pub fn daily_at(spec: &str) -> Result<Self, KeeperError> {
        NaiveTime::parse_from_str(spec.trim(), "%H:%M")
            .map(Cadence::Daily)
            .map_err(|e| KeeperError::Config(format!("invalid daily time {spec:?}: {e}")))
    }

    /// Parse `MM:SS`.
    pub fn hourly_at(spec: &str) -> Result<Self, KeeperError> {
        let invalid =
            || KeeperError::Config(format!("invalid hourly time {spec:?}: expected MM:SS"));
        let (minute, second) = spec.trim().split_once(':').ok_or_else(invalid)?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        let second: u32 = second.parse().map_err(|_| invalid())?;
        if minute > 59 || second > 59 {
            return Err(invalid());
        }
        Ok(Cadence::Hourly { minute, second })
    }

    pub fn every(interval: Duration) -> Result<Self, KeeperError> {
        if interval.is_zero() {
            return Err(KeeperError::Config("interval must be positive".into()));
        }
        Ok(Cadence::Every(interval))
    }

    /// First moment strictly after `now` at which this cadence fires.
    pub fn next_due(&self, now: Now) -> Due {
        let wall = now.wall;
        match *self {
            Cadence::Daily(at) => {
                let today = wall.date().and_time(at);
                if today > wall {
                    Due::At(today)
                } else {
                    Due::At(today + TimeDelta::days(1))
                }
            }
            Cadence::Hourly { minute, second } => {
                let this_hour = wall
                    .date()
                    .and_hms_opt(wall.hour(), minute, second)
                    .unwrap_or(wall);
                if this_hour > wall {
                    Due::At(this_hour)
                } else {
                    Due::At(this_hour + TimeDelta::hours(1))
                }
            }
            Cadence::Every(interval) => now
                .mono
                .checked_add(interval)
                .map_or(Due::Never, Due::After),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
            Cadence::Hourly { minute, second } => {
                write!(f, "hourly at {minute:02}:{second:02}")
            }
            Cadence::Every(interval) => write!(f, "every {}s", interval.as_secs_f64()),
        }
    }
}

/// One static registration: a cadence and what to do when it comes due.
pub struct ScheduleEntry {
    pub label: &'static str,
    pub cadence: Cadence,
    next_run: Due,
    action: Box<dyn FnMut()>,
}

impl ScheduleEntry {
    pub fn next_run(&self) -> Due {
        self.next_run
    }
}

#[derive(Default)]
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` to run on `cadence`, counting from `now`.
    pub fn register_at(
        &mut self,
        now: Now,
        label: &'static str,
        cadence: Cadence,
        action: impl FnMut() + 'static,
    ) {
        let next_run = cadence.next_due(now);
        debug!(label, %cadence, ?next_run, "registered schedule entry");
        self.entries.push(ScheduleEntry {
            label,
            cadence,
            next_run,
            action: Box::new(action),
        });
    }


    /// Run every entry due at `now`, in registration order. Returns how many ran.
    pub fn run_pending_at(&mut self, now: Now) -> usize {
        let mut ran = 0;
        for entry in self.entries.iter_mut().filter(|e| e.next_run.reached(now)) {
            debug!(label = entry.label, "schedule entry due");
            (entry.action)();
            entry.next_run = entry.cadence.next_due(now);
            ran += 1;
        }
        ran
    }

    pub fn run_pending(&mut self) -> usize {
        self.run_pending_at(Now::read())
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
