use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::limits::*;

/// Opening window for one weekday. `day_of_week` is ISO: 1 = Monday … 7 = Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub day_of_week: u8,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    #[serde(default)]
    pub is_closed: bool,
}

impl OperatingHours {
    pub fn open(day_of_week: u8, open_time: NaiveTime, close_time: NaiveTime) -> Self {
        Self {
            day_of_week,
            open_time,
            close_time,
            is_closed: false,
        }
    }

    pub fn closed(day_of_week: u8) -> Self {
        Self {
            day_of_week,
            open_time: NaiveTime::default(),
            close_time: NaiveTime::default(),
            is_closed: true,
        }
    }

    pub fn window_minutes(&self) -> i64 {
        (self.close_time - self.open_time).num_minutes()
    }
}

/// Booking rules of a facility. Read-only during a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityPolicy {
    /// Length of every generated slot.
    pub min_booking_minutes: u32,
    pub max_booking_minutes: u32,
    /// Idle gap between consecutive generated slots.
    #[serde(default)]
    pub buffer_minutes: u32,
    pub booking_window_days: u32,
    #[serde(default)]
    pub requires_subscription: bool,
    /// At most one entry per weekday; a missing weekday means closed.
    #[serde(default)]
    pub operating_hours: Vec<OperatingHours>,
}

impl FacilityPolicy {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_booking_minutes == 0 || self.min_booking_minutes > MINUTES_PER_DAY {
            return Err(invalid(format!(
                "min_booking_minutes must be within 1..={MINUTES_PER_DAY}, got {}",
                self.min_booking_minutes
            )));
        }
        if self.max_booking_minutes < self.min_booking_minutes
            || self.max_booking_minutes > MINUTES_PER_DAY
        {
            return Err(invalid(format!(
                "max_booking_minutes must be within {}..={MINUTES_PER_DAY}, got {}",
                self.min_booking_minutes, self.max_booking_minutes
            )));
        }
        if self.buffer_minutes > MINUTES_PER_DAY {
            return Err(invalid(format!(
                "buffer_minutes must not exceed {MINUTES_PER_DAY}, got {}",
                self.buffer_minutes
            )));
        }
        if self.booking_window_days == 0 || self.booking_window_days > MAX_BOOKING_WINDOW_DAYS {
            return Err(invalid(format!(
                "booking_window_days must be within 1..={MAX_BOOKING_WINDOW_DAYS}, got {}",
                self.booking_window_days
            )));
        }

        let mut seen = HashSet::new();
        for hours in &self.operating_hours {
            if !(1..=7).contains(&hours.day_of_week) {
                return Err(invalid(format!(
                    "day_of_week must be within 1..=7, got {}",
                    hours.day_of_week
                )));
            }
            if !seen.insert(hours.day_of_week) {
                return Err(invalid(format!(
                    "duplicate operating hours for day_of_week {}",
                    hours.day_of_week
                )));
            }
            if !hours.is_closed && hours.open_time >= hours.close_time {
                return Err(invalid(format!(
                    "open_time {} must be before close_time {} on day_of_week {}",
                    hours.open_time, hours.close_time, hours.day_of_week
                )));
            }
        }
        Ok(())
    }

    /// Opening window for `date`, or `None` when the facility is closed that day.
    pub fn hours_for(&self, date: NaiveDate) -> Option<&OperatingHours> {
        let dow = date.weekday().number_from_monday() as u8;
        self.operating_hours
            .iter()
            .find(|h| h.day_of_week == dow)
            .filter(|h| !h.is_closed)
    }

    /// Last date slots may be generated for, counting from `today`.
    pub fn window_end(&self, today: NaiveDate) -> NaiveDate {
        today + chrono::Days::new(u64::from(self.booking_window_days))
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::InvalidArgument(msg)
}
