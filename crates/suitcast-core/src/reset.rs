use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wall-clock moment of the daily reset, in a fixed-offset zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetSchedule {
    pub utc_offset_minutes: i32,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 60,
            hour: 0,
            minute: 59,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    #[error("utc offset of {minutes} minutes is out of range")]
    Offset { minutes: i32 },
    #[error("{hour:02}:{minute:02} is not a valid time of day")]
    Time { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetState {
    pub last_reset_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ResetCoordinator {
    zone: FixedOffset,
    at: NaiveTime,
    state: ResetState,
}

impl ResetCoordinator {
    pub fn new(schedule: ResetSchedule) -> Result<Self, ResetError> {
        let zone = schedule
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ResetError::Offset {
                minutes: schedule.utc_offset_minutes,
            })?;
        let at = NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0).ok_or(
            ResetError::Time {
                hour: schedule.hour,
                minute: schedule.minute,
            },
        )?;
        Ok(Self {
            zone,
            at,
            state: ResetState::default(),
        })
    }

    pub fn state(&self) -> ResetState {
        self.state
    }

    /// Local date to reset for, when a reset is owed at `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let local = now.with_timezone(&self.zone);
        let today = local.date_naive();
        if self.state.last_reset_date == Some(today) || local.time() < self.at {
            return None;
        }
        Some(today)
    }

    pub fn mark(&mut self, date: NaiveDate) {
        self.state.last_reset_date = Some(date);
    }

    pub(crate) fn restore(&mut self, state: ResetState) {
        self.state = state;
    }
}
