use std::time::Instant;

use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::MAX_NOTES_LEN;
use crate::model::*;
use crate::observability::{self, BOOKINGS_CREATED_TOTAL, BOOKING_CONFLICTS_TOTAL};

use super::{Engine, EngineError};

impl Engine {
    /// Claim an available slot for a member.
    ///
    /// Checks run in a fixed order and the first failure is returned: notes
    /// length, facility, member (and subscription when the policy asks for one),
    /// slot ownership, then availability. Availability is checked and the claim
    /// written under the slot's lock; losing the race is a `Conflict`. The slot
    /// and the booking are written as one unit.
    pub async fn create_booking(
        &self,
        facility_id: Ulid,
        slot_id: Ulid,
        member_id: Ulid,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let result = self.claim(facility_id, slot_id, member_id, notes).await;
        self.slot_locks.prune();
        observability::record_operation("create_booking", started, &result);
        if let Err(EngineError::Conflict(reason)) = &result {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!(%slot_id, %member_id, reason = %reason, "claim lost");
        }
        result
    }

    async fn claim(
        &self,
        facility_id: Ulid,
        slot_id: Ulid,
        member_id: Ulid,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        if let Some(n) = &notes
            && n.len() > MAX_NOTES_LEN
        {
            return Err(EngineError::InvalidArgument(format!(
                "notes exceed {MAX_NOTES_LEN} bytes"
            )));
        }

        let facility = self.load_active_facility(facility_id).await?;
        if !self.members.member_exists(member_id).await? {
            return Err(EngineError::member_not_found(member_id));
        }
        if facility.policy.requires_subscription
            && !self.members.has_active_subscription(member_id, facility_id).await?
        {
            return Err(EngineError::InvalidState(format!(
                "member {member_id} has no active subscription for facility {facility_id}"
            )));
        }

        let _guard = self.slot_locks.lock(slot_id).await;

        let mut slot = self
            .store
            .find_slot(slot_id)
            .await?
            .ok_or(EngineError::slot_not_found(slot_id))?;
        if slot.facility_id != facility_id {
            return Err(EngineError::InvalidArgument(format!(
                "slot {slot_id} does not belong to facility {facility_id}"
            )));
        }
        if !slot.is_available() {
            return Err(EngineError::Conflict(format!(
                "slot {slot_id} is not available ({:?})",
                slot.status
            )));
        }
        if let Some(holder) = self.store.find_active_booking_for_slot(slot_id).await? {
            return Err(EngineError::Conflict(format!(
                "slot {slot_id} is already held by booking {}",
                holder.id
            )));
        }

        slot.status = SlotStatus::Booked;
        let booking = Booking {
            id: Ulid::new(),
            facility_id,
            slot_id,
            member_id,
            status: BookingStatus::Confirmed,
            booked_at: self.clock.now(),
            notes,
            cancel_reason: None,
        };
        self.store.claim(slot, booking.clone()).await?;

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        info!(booking_id = %booking.id, %facility_id, %slot_id, %member_id, "booking confirmed");
        self.notify.send(
            facility_id,
            Event::BookingCreated {
                booking_id: booking.id,
                facility_id,
                slot_id,
                member_id,
            },
        );
        Ok(booking)
    }
}
