//! Speech timer state machine.
//!
//! Pure and clock-injected: callers pass the current instant to every operation, so the
//! session controller drives it from a tokio interval and tests drive it with fabricated
//! instants.

use crate::model::{Alert, Milestone, SignalMode};
use std::fmt;
use thiserror::Error;
use tokio::time::{Duration, Instant};

/// Seconds past the end minute after which an already-signalled session completes.
const OVERTIME_GRACE_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("a session is already running")]
    AlreadyRunning,
}

/// Explicit configuration handed to the controller at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub end_minutes: u64,
    pub signal_mode: SignalMode,
}

impl From<crate::model::Preferences> for TimerConfig {
    fn from(p: crate::model::Preferences) -> Self {
        Self {
            end_minutes: p.length.minutes(),
            signal_mode: p.signal,
        }
    }
}

/// Elapsed time split the way it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub minutes: u64,
    pub seconds: u64,
}

impl From<Duration> for Elapsed {
    fn from(d: Duration) -> Self {
        let secs = d.as_secs();
        Self {
            minutes: secs / 60,
            seconds: secs % 60,
        }
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MilestoneFlags {
    pub one_minute: bool,
    pub near_end: bool,
    pub end_reached: bool,
}

/// Result of one tick of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub elapsed: Elapsed,
    pub display: String,
    pub alerts: Vec<Alert>,
    /// The session auto-stopped on this tick.
    pub completed: bool,
}

#[derive(Debug)]
pub struct TimerController {
    config: TimerConfig,
    start_instant: Option<Instant>,
    flags: MilestoneFlags,
}

impl TimerController {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            start_instant: None,
            flags: MilestoneFlags::default(),
        }
    }

    pub fn config(&self) -> TimerConfig {
        self.config
    }

    /// Takes effect on the next tick, including for a running session.
    pub fn set_end_minutes(&mut self, end_minutes: u64) {
        self.config.end_minutes = end_minutes;
    }

    pub fn set_signal_mode(&mut self, signal_mode: SignalMode) {
        self.config.signal_mode = signal_mode;
    }

    pub fn is_running(&self) -> bool {
        self.start_instant.is_some()
    }

    pub fn flags(&self) -> MilestoneFlags {
        self.flags
    }

    pub fn start(&mut self, now: Instant) -> Result<(), TimerError> {
        if self.start_instant.is_some() {
            return Err(TimerError::AlreadyRunning);
        }
        self.start_instant = Some(now);
        self.flags = MilestoneFlags::default();
        tracing::debug!(end_minutes = self.config.end_minutes, "session started");
        Ok(())
    }

    /// Returns whether a session was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.start_instant.take().is_some();
        self.flags = MilestoneFlags::default();
        if was_running {
            tracing::debug!("session stopped");
        }
        was_running
    }

    pub fn elapsed(&self, now: Instant) -> Option<Elapsed> {
        self.start_instant
            .map(|start| Elapsed::from(now.saturating_duration_since(start)))
    }

    /// Advance a running session to `now`; `None` when stopped.
    pub fn tick(&mut self, now: Instant) -> Option<TickOutcome> {
        let elapsed = self.elapsed(now)?;
        let Elapsed { minutes, seconds } = elapsed;
        let end = self.config.end_minutes;
        let mut alerts = Vec::new();
        let mut completed = false;

        if minutes == 1 && !self.flags.one_minute {
            alerts.push(Alert::single(Milestone::OneMinute));
            self.flags.one_minute = true;
        }
        // Independent of the check above: with a two minute speech both fire together.
        if end.checked_sub(1) == Some(minutes) && !self.flags.near_end {
            alerts.push(Alert::single(Milestone::NearEnd));
            self.flags.near_end = true;
        }
        if minutes >= end {
            if seconds > 0 && !self.flags.end_reached {
                alerts.push(Alert::triple(Milestone::EndReached));
                self.flags.end_reached = true;
            } else if seconds > OVERTIME_GRACE_SECS {
                alerts.push(Alert::triple(Milestone::Overtime));
                self.stop();
                completed = true;
            }
        }

        for alert in &alerts {
            tracing::debug!(milestone = ?alert.milestone, %elapsed, "milestone reached");
        }

        Some(TickOutcome {
            elapsed,
            display: elapsed.to_string(),
            alerts,
            completed,
        })
    }
}
