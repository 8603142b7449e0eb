use ulid::Ulid;

use crate::limits::MAX_QUERY_DAYS;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Slots of a facility for one date or an inclusive date range, ordered by
    /// date then start time.
    pub async fn list_slots(
        &self,
        facility_id: Ulid,
        query: SlotQuery,
        available_only: bool,
    ) -> Result<Vec<Slot>, EngineError> {
        let (start, end) = match query {
            SlotQuery::Date(date) => (date, date),
            SlotQuery::Range { start, end } => (start, end),
        };
        if start > end {
            return Err(EngineError::InvalidArgument(format!(
                "range start {start} is after end {end}"
            )));
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_QUERY_DAYS {
            return Err(EngineError::InvalidArgument(format!(
                "cannot list {days} days at once (max {MAX_QUERY_DAYS})"
            )));
        }
        self.load_facility(facility_id).await?;

        let mut slots = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let day = self.store.find_slots_by_facility_and_date(facility_id, date).await?;
            slots.extend(day.into_iter().filter(|s| !available_only || s.is_available()));
        }
        Ok(slots)
    }

    pub async fn get_slot(&self, slot_id: Ulid) -> Result<Slot, EngineError> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or(EngineError::slot_not_found(slot_id))
    }

    pub async fn get_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or(EngineError::booking_not_found(booking_id))
    }

    /// Every booking of a member, oldest first.
    pub async fn member_bookings(&self, member_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        if !self.members.member_exists(member_id).await? {
            return Err(EngineError::member_not_found(member_id));
        }
        self.store.find_bookings_for_member(member_id).await
    }
}
