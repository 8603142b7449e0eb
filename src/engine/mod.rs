mod booking;
mod error;
mod generation;
mod lifecycle;
mod locks;
mod queries;

pub use error::EngineError;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{Event, Facility};
use crate::notify::NotifyHub;
use crate::store::{FacilityDirectory, MemberDirectory, ScheduleStore};

use locks::LockTable;

/// Source of "now" for `booked_at` and of "today" for the booking window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Slot generation and the booking state machine.
///
/// Claims and lifecycle transitions on a slot run under that slot's lock, so the
/// read-check-write sequence is atomic per slot. Generation runs under a lock per
/// (facility, date).
pub struct Engine {
    store: Arc<dyn ScheduleStore>,
    facilities: Arc<dyn FacilityDirectory>,
    members: Arc<dyn MemberDirectory>,
    notify: Arc<NotifyHub>,
    clock: Arc<dyn Clock>,
    slot_locks: LockTable<Ulid>,
    day_locks: LockTable<(Ulid, NaiveDate)>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        facilities: Arc<dyn FacilityDirectory>,
        members: Arc<dyn MemberDirectory>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            store,
            facilities,
            members,
            notify,
            clock: Arc::new(SystemClock),
            slot_locks: LockTable::new(),
            day_locks: LockTable::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Committed events of one facility.
    pub fn subscribe(&self, facility_id: Ulid) -> broadcast::Receiver<Event> {
        self.notify.subscribe(facility_id)
    }

    /// Forget idle slot and day locks.
    pub fn prune_locks(&self) {
        self.slot_locks.prune();
        self.day_locks.prune();
    }

    pub(super) async fn load_facility(&self, id: Ulid) -> Result<Facility, EngineError> {
        self.facilities
            .get_facility(id)
            .await?
            .ok_or(EngineError::facility_not_found(id))
    }

    pub(super) async fn load_active_facility(&self, id: Ulid) -> Result<Facility, EngineError> {
        let facility = self.load_facility(id).await?;
        if !facility.is_active() {
            return Err(EngineError::InvalidState(format!("facility {id} is not active")));
        }
        Ok(facility)
    }
}
