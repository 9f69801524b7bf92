//! Rest timer state structure and its transitions
//!
//! Transitions take the current wall-clock time explicitly and never touch the
//! scheduler. Each returns whether the state actually changed so callers only
//! notify subscribers on real transitions. Calls that are invalid for the
//! current phase are silent no-ops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RestClockError, Result};

/// Coarse lifecycle phase derived from the timer flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// Optional association of a rest period with what was just performed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerMetadata {
    pub movement_id: Option<String>,
    pub workout_id: Option<String>,
}

impl TimerMetadata {
    pub fn for_movement(movement_id: impl Into<String>) -> Self {
        Self {
            movement_id: Some(movement_id.into()),
            workout_id: None,
        }
    }
}

/// The single rest countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimerState {
    /// Running, paused or completed (anything but idle)
    pub is_active: bool,
    pub is_paused: bool,
    pub is_completed: bool,
    /// When the countdown was (re)started, shifted forward by time spent paused
    pub start_time: Option<DateTime<Utc>>,
    /// Configured length in seconds
    pub duration: u64,
    pub remaining_time: u64,
    pub paused_at: Option<DateTime<Utc>>,
    pub movement_id: Option<String>,
    pub workout_id: Option<String>,
}

impl RestTimerState {
    /// Create an idle timer
    pub fn idle() -> Self {
        Self {
            is_active: false,
            is_paused: false,
            is_completed: false,
            start_time: None,
            duration: 0,
            remaining_time: 0,
            paused_at: None,
            movement_id: None,
            workout_id: None,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        if !self.is_active {
            TimerPhase::Idle
        } else if self.is_completed {
            TimerPhase::Completed
        } else if self.is_paused {
            TimerPhase::Paused
        } else {
            TimerPhase::Running
        }
    }

    /// True while the countdown should be decremented by the tick loop
    pub fn is_counting_down(&self) -> bool {
        self.phase() == TimerPhase::Running
    }

    /// Start a new countdown, replacing whatever was there
    pub fn start(&mut self, duration: u64, metadata: TimerMetadata, now: DateTime<Utc>) -> Result<()> {
        if duration == 0 {
            return Err(RestClockError::InvalidDuration);
        }

        *self = Self {
            is_active: true,
            is_paused: false,
            is_completed: false,
            start_time: Some(now),
            duration,
            remaining_time: duration,
            paused_at: None,
            movement_id: metadata.movement_id,
            workout_id: metadata.workout_id,
        };
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_counting_down() {
            return false;
        }
        self.is_paused = true;
        self.paused_at = Some(now);
        true
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.phase() != TimerPhase::Paused {
            return false;
        }
        if let (Some(start), Some(paused_at)) = (self.start_time, self.paused_at.take()) {
            self.start_time = Some(start + (now - paused_at));
        }
        self.is_paused = false;
        true
    }

    /// Restore the full duration and keep counting down from it
    pub fn reset(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.remaining_time = self.duration;
        self.is_paused = false;
        self.is_completed = false;
        self.paused_at = None;
        self.start_time = Some(now);
        true
    }

    /// Return to idle from any phase
    pub fn cancel(&mut self) -> bool {
        if *self == Self::idle() {
            return false;
        }
        *self = Self::idle();
        true
    }

    /// Extend the current rest period
    ///
    /// Ignored when idle. A completed timer comes back to life and resumes
    /// counting down the added seconds.
    pub fn add_time(&mut self, seconds: u64) -> bool {
        if !self.is_active || seconds == 0 {
            return false;
        }
        self.duration = self.duration.saturating_add(seconds);
        self.remaining_time = self.remaining_time.saturating_add(seconds);
        if self.is_completed {
            self.is_completed = false;
            self.is_paused = false;
            self.paused_at = None;
        }
        true
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> bool {
        if !self.is_counting_down() {
            return false;
        }
        self.remaining_time = self.remaining_time.saturating_sub(1);
        if self.remaining_time == 0 {
            self.is_completed = true;
        }
        true
    }

    /// Share of the duration already elapsed, 0..=100
    pub fn progress_percentage(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        let elapsed = self.duration - self.remaining_time.min(self.duration);
        100.0 * elapsed as f64 / self.duration as f64
    }

    /// True when the countdown is about to finish
    pub fn is_warning(&self, threshold: u64) -> bool {
        self.remaining_time > 0 && self.remaining_time <= threshold
    }
}

impl Default for RestTimerState {
    fn default() -> Self {
        Self::idle()
    }
}
