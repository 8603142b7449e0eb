use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

use super::{BookingStore, ScheduleStore, SlotStore};

type DayKey = (Ulid, NaiveDate);

/// Reference store. Also the materialized state behind `WalStore`.
pub struct InMemoryStore {
    slots: DashMap<Ulid, Slot>,
    /// (facility, date) → (start_time, slot id), sorted by start time.
    days: DashMap<DayKey, Vec<(NaiveTime, Ulid)>>,
    bookings: DashMap<Ulid, Booking>,
    /// Slot id → id of the booking currently holding it.
    active_by_slot: DashMap<Ulid, Ulid>,
    /// Member id → booking ids in creation order.
    by_member: DashMap<Ulid, Vec<Ulid>>,
    /// Makes check-then-put atomic for direct callers.
    write_lock: Mutex<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            days: DashMap::new(),
            bookings: DashMap::new(),
            active_by_slot: DashMap::new(),
            by_member: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    // ── Slots ────────────────────────────────────────────────

    pub fn get_slot(&self, id: &Ulid) -> Option<Slot> {
        self.slots.get(id).map(|e| e.value().clone())
    }

    pub fn slots_on(&self, facility_id: Ulid, date: NaiveDate) -> Vec<Slot> {
        let ids: Vec<Ulid> = self
            .days
            .get(&(facility_id, date))
            .map(|e| e.value().iter().map(|(_, id)| *id).collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get_slot(id)).collect()
    }

    pub fn has_slots_on(&self, facility_id: Ulid, date: NaiveDate) -> bool {
        self.days
            .get(&(facility_id, date))
            .is_some_and(|e| !e.value().is_empty())
    }

    /// Validate a batch against stored slots and against itself.
    ///
    /// Known ids may only change status; new ids must not overlap anything on
    /// their facility/date.
    pub fn check_slots(&self, batch: &[Slot]) -> Result<(), EngineError> {
        for (i, slot) in batch.iter().enumerate() {
            if slot.start_time >= slot.end_time {
                return Err(EngineError::InvalidArgument(format!(
                    "slot {} ends before it starts",
                    slot.id
                )));
            }
            if let Some(existing) = self.get_slot(&slot.id) {
                if existing.facility_id != slot.facility_id
                    || existing.date != slot.date
                    || existing.start_time != slot.start_time
                    || existing.end_time != slot.end_time
                {
                    return Err(EngineError::InvalidArgument(format!(
                        "slot {} cannot move to a different facility, date or time",
                        slot.id
                    )));
                }
                continue;
            }
            if let Some(other) = self
                .slots_on(slot.facility_id, slot.date)
                .iter()
                .find(|other| other.overlaps(slot))
            {
                return Err(EngineError::Conflict(format!(
                    "slot {} overlaps existing slot {}",
                    slot.id, other.id
                )));
            }
            if let Some(other) = batch[..i].iter().find(|other| other.id != slot.id && other.overlaps(slot)) {
                return Err(EngineError::Conflict(format!(
                    "slot {} overlaps slot {} in the same batch",
                    slot.id, other.id
                )));
            }
        }
        Ok(())
    }

    /// Apply without validation. Used after `check_slots` and during replay.
    pub fn put_slot(&self, slot: Slot) {
        let key = (slot.facility_id, slot.date);
        let is_new = self.slots.insert(slot.id, slot.clone()).is_none();
        if is_new {
            let mut day = self.days.entry(key).or_default();
            let pos = day
                .binary_search_by_key(&slot.start_time, |(start, _)| *start)
                .unwrap_or_else(|e| e);
            day.insert(pos, (slot.start_time, slot.id));
        }
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn active_booking_for(&self, slot_id: &Ulid) -> Option<Booking> {
        let id = self.active_by_slot.get(slot_id).map(|e| *e.value())?;
        self.get_booking(&id)
    }

    pub fn bookings_of(&self, member_id: &Ulid) -> Vec<Booking> {
        let ids: Vec<Ulid> = self
            .by_member
            .get(member_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get_booking(id)).collect()
    }

    pub fn check_booking(&self, booking: &Booking) -> Result<(), EngineError> {
        if let Some(existing) = self.get_booking(&booking.id)
            && (existing.slot_id != booking.slot_id || existing.member_id != booking.member_id)
        {
            return Err(EngineError::InvalidArgument(format!(
                "booking {} cannot move to a different slot or member",
                booking.id
            )));
        }
        if booking.is_active()
            && let Some(holder) = self.active_by_slot.get(&booking.slot_id).map(|e| *e.value())
            && holder != booking.id
        {
            return Err(EngineError::Conflict(format!(
                "slot {} already held by booking {holder}",
                booking.slot_id
            )));
        }
        Ok(())
    }

    /// Apply without validation. Keeps the active-holder index in step with status.
    pub fn put_booking(&self, booking: Booking) {
        let (id, slot_id, member_id, active) = (booking.id, booking.slot_id, booking.member_id, booking.is_active());
        let is_new = self.bookings.insert(id, booking).is_none();
        if is_new {
            self.by_member.entry(member_id).or_default().push(id);
        }
        if active {
            self.active_by_slot.insert(slot_id, id);
        } else {
            self.active_by_slot.remove_if(&slot_id, |_, holder| *holder == id);
        }
    }

    // ── Slot + booking units ─────────────────────────────────

    pub fn check_claim(&self, slot: &Slot, booking: &Booking) -> Result<(), EngineError> {
        if slot.id != booking.slot_id || slot.status != SlotStatus::Booked || !booking.is_active() {
            return Err(EngineError::InvalidArgument(format!(
                "claim of slot {} must pair a BOOKED slot with an active booking of it",
                slot.id
            )));
        }
        self.check_slots(std::slice::from_ref(slot))?;
        self.check_booking(booking)
    }

    pub fn check_transition(&self, booking: &Booking, released: Option<&Slot>) -> Result<(), EngineError> {
        if let Some(slot) = released {
            if slot.id != booking.slot_id || booking.is_active() {
                return Err(EngineError::InvalidArgument(format!(
                    "only an ended booking can release its own slot {}",
                    slot.id
                )));
            }
            self.check_slots(std::slice::from_ref(slot))?;
        }
        self.check_booking(booking)
    }

    /// Apply a claim. The booking lands before the slot turns BOOKED, so a
    /// lock-free reader never sees a BOOKED slot without its holder.
    pub fn put_claim(&self, slot: Slot, booking: Booking) {
        self.put_booking(booking);
        self.put_slot(slot);
    }

    /// Apply a transition. A released slot turns AVAILABLE before its booking ends.
    pub fn put_transition(&self, booking: Booking, released: Option<Slot>) {
        if let Some(slot) = released {
            self.put_slot(slot);
        }
        self.put_booking(booking);
    }

    // ── Snapshot ─────────────────────────────────────────────

    /// Every record, in a stable order (slots by facility/date/start, bookings by id).
    pub fn snapshot(&self) -> (Vec<Slot>, Vec<Booking>) {
        let mut slots: Vec<Slot> = self.slots.iter().map(|e| e.value().clone()).collect();
        slots.sort_by_key(|s| (s.facility_id, s.date, s.start_time));
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);
        (slots, bookings)
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SlotStore for InMemoryStore {
    async fn find_slot(&self, id: Ulid) -> Result<Option<Slot>, EngineError> {
        Ok(self.get_slot(&id))
    }

    async fn find_slots_by_facility_and_date(
        &self,
        facility_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        Ok(self.slots_on(facility_id, date))
    }

    async fn exists_slots_for(&self, facility_id: Ulid, date: NaiveDate) -> Result<bool, EngineError> {
        Ok(self.has_slots_on(facility_id, date))
    }

    async fn save_slot(&self, slot: Slot) -> Result<(), EngineError> {
        let _guard = self.guard();
        self.check_slots(std::slice::from_ref(&slot))?;
        self.put_slot(slot);
        Ok(())
    }

    async fn save_slots(&self, slots: Vec<Slot>) -> Result<(), EngineError> {
        let _guard = self.guard();
        self.check_slots(&slots)?;
        for slot in slots {
            self.put_slot(slot);
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn claim(&self, slot: Slot, booking: Booking) -> Result<(), EngineError> {
        let _guard = self.guard();
        self.check_claim(&slot, &booking)?;
        self.put_claim(slot, booking);
        Ok(())
    }

    async fn transition(&self, booking: Booking, released: Option<Slot>) -> Result<(), EngineError> {
        let _guard = self.guard();
        self.check_transition(&booking, released.as_ref())?;
        self.put_transition(booking, released);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.get_booking(&id))
    }

    async fn find_active_booking_for_slot(&self, slot_id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.active_booking_for(&slot_id))
    }

    async fn find_bookings_for_member(&self, member_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        Ok(self.bookings_of(&member_id))
    }

    async fn save_booking(&self, booking: Booking) -> Result<(), EngineError> {
        let _guard = self.guard();
        self.check_booking(&booking)?;
        self.put_booking(booking);
        Ok(())
    }
}
