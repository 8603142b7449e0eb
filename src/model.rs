use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::policy::FacilityPolicy;

// ── Facility ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: Ulid,
    pub name: String,
    pub status: FacilityStatus,
    pub policy: FacilityPolicy,
}

impl Facility {
    pub fn is_active(&self) -> bool {
        self.status == FacilityStatus::Active
    }
}

// ── Slot ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Booked,
    /// Set by external maintenance tooling. Never bookable.
    Maintenance,
}

/// A fixed half-open interval `[start_time, end_time)` on one date of one facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
}

impl Slot {
    pub fn new(facility_id: Ulid, date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        debug_assert!(start_time < end_time, "slot start must be before end");
        Self {
            id: Ulid::new(),
            facility_id,
            date,
            start_time,
            end_time,
            status: SlotStatus::Available,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Same facility, same date, intersecting time ranges. Adjacent slots do not overlap.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.facility_id == other.facility_id
            && self.date == other.date
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }
}

// ── Booking ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Holds the slot: CONFIRMED or CHECKED_IN.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub slot_id: Ulid,
    pub member_id: Ulid,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Lifecycle edges out of CONFIRMED / CHECKED_IN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CheckIn,
    Complete,
    Cancel,
    NoShow,
}

impl Transition {
    pub fn target(self) -> BookingStatus {
        match self {
            Transition::CheckIn => BookingStatus::CheckedIn,
            Transition::Complete => BookingStatus::Completed,
            Transition::Cancel => BookingStatus::Cancelled,
            Transition::NoShow => BookingStatus::NoShow,
        }
    }

    pub fn allowed_from(self, from: BookingStatus) -> bool {
        match self {
            Transition::CheckIn | Transition::NoShow => from == BookingStatus::Confirmed,
            Transition::Complete | Transition::Cancel => from.is_active(),
        }
    }

    /// Only a cancellation hands the slot back. A no-show or completion happens
    /// after the slot's time has passed, so the slot is never re-offered.
    pub fn releases_slot(self) -> bool {
        matches!(self, Transition::Cancel)
    }

    pub fn label(self) -> &'static str {
        match self {
            Transition::CheckIn => "check_in",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
            Transition::NoShow => "no_show",
        }
    }
}

// ── Queries ──────────────────────────────────────────────────────

/// Date selector for `Engine::list_slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotQuery {
    Date(NaiveDate),
    /// Inclusive on both ends.
    Range { start: NaiveDate, end: NaiveDate },
}

// ── Events ───────────────────────────────────────────────────────

/// Committed state changes, published per facility on the notify hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SlotsGenerated {
        facility_id: Ulid,
        date: NaiveDate,
        count: usize,
    },
    BookingCreated {
        booking_id: Ulid,
        facility_id: Ulid,
        slot_id: Ulid,
        member_id: Ulid,
    },
    BookingTransitioned {
        booking_id: Ulid,
        facility_id: Ulid,
        slot_id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
}
