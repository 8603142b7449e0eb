//! Repository seams consumed by the engine.
//!
//! `SlotStore` and `BookingStore` own persisted records; `FacilityDirectory` and
//! `MemberDirectory` answer lookups against systems the engine does not own.

mod directory;
mod durable;
mod memory;

pub use directory::{InMemoryDirectory, Member};
pub use durable::WalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Booking, Facility, Slot};

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn find_slot(&self, id: Ulid) -> Result<Option<Slot>, EngineError>;

    /// Slots of one facility on one date, ordered by start time.
    async fn find_slots_by_facility_and_date(
        &self,
        facility_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError>;

    async fn exists_slots_for(&self, facility_id: Ulid, date: NaiveDate) -> Result<bool, EngineError>;

    /// Insert or update one slot. A new slot overlapping another slot of the same
    /// facility/date is rejected with `Conflict`.
    async fn save_slot(&self, slot: Slot) -> Result<(), EngineError>;

    /// All-or-nothing insert/update of a batch, with the same overlap rule.
    async fn save_slots(&self, slots: Vec<Slot>) -> Result<(), EngineError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError>;

    /// The CONFIRMED or CHECKED_IN booking holding `slot_id`, if any.
    async fn find_active_booking_for_slot(&self, slot_id: Ulid) -> Result<Option<Booking>, EngineError>;

    /// All bookings of a member, oldest first.
    async fn find_bookings_for_member(&self, member_id: Ulid) -> Result<Vec<Booking>, EngineError>;

    /// Insert or update. A second active booking for the same slot is rejected
    /// with `Conflict`.
    async fn save_booking(&self, booking: Booking) -> Result<(), EngineError>;
}

/// Everything the engine persists through, plus the two writes that touch a
/// slot and a booking together. Each is applied as one unit: either both
/// records are stored or neither is.
#[async_trait]
pub trait ScheduleStore: SlotStore + BookingStore {
    /// Store a BOOKED slot and the new booking holding it.
    async fn claim(&self, slot: Slot, booking: Booking) -> Result<(), EngineError>;

    /// Store a booking's new status and, when it gave the slot back, the
    /// released slot.
    async fn transition(&self, booking: Booking, released: Option<Slot>) -> Result<(), EngineError>;
}

#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn get_facility(&self, id: Ulid) -> Result<Option<Facility>, EngineError>;
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member_exists(&self, member_id: Ulid) -> Result<bool, EngineError>;

    /// Consulted only for facilities whose policy requires a subscription.
    async fn has_active_subscription(&self, member_id: Ulid, facility_id: Ulid) -> Result<bool, EngineError>;
}
