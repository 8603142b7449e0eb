use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::MAX_CANCEL_REASON_LEN;
use crate::model::*;
use crate::observability::{self, BOOKING_TRANSITIONS_TOTAL};

use super::{Engine, EngineError};

impl Engine {
    /// CONFIRMED → CHECKED_IN.
    pub async fn check_in(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        self.transition(booking_id, Transition::CheckIn, None).await
    }

    /// CONFIRMED | CHECKED_IN → COMPLETED. The slot stays booked.
    pub async fn complete(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        self.transition(booking_id, Transition::Complete, None).await
    }

    /// CONFIRMED | CHECKED_IN → CANCELLED, and the slot becomes available again.
    pub async fn cancel(&self, booking_id: Ulid, reason: Option<String>) -> Result<Booking, EngineError> {
        self.transition(booking_id, Transition::Cancel, reason).await
    }

    /// CONFIRMED → NO_SHOW. The slot stays booked.
    pub async fn mark_no_show(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        self.transition(booking_id, Transition::NoShow, None).await
    }

    async fn transition(
        &self,
        booking_id: Ulid,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let result = self.apply_transition(booking_id, transition, reason).await;
        self.slot_locks.prune();
        observability::record_operation(transition.label(), started, &result);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => {
                debug!(%booking_id, transition = transition.label(), error = %e, "transition rejected");
                e.kind()
            }
        };
        metrics::counter!(
            BOOKING_TRANSITIONS_TOTAL,
            "transition" => transition.label(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn apply_transition(
        &self,
        booking_id: Ulid,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        if let Some(r) = &reason
            && r.len() > MAX_CANCEL_REASON_LEN
        {
            return Err(EngineError::InvalidArgument(format!(
                "cancel reason exceeds {MAX_CANCEL_REASON_LEN} bytes"
            )));
        }

        // A booking never changes slot, so this read only picks the lock.
        let slot_id = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(EngineError::booking_not_found(booking_id))?
            .slot_id;
        let _guard = self.slot_locks.lock(slot_id).await;

        let current = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(EngineError::booking_not_found(booking_id))?;
        if !transition.allowed_from(current.status) {
            return Err(EngineError::InvalidState(format!(
                "cannot {} booking {booking_id} in status {}",
                transition.label(),
                current.status
            )));
        }

        let mut updated = current.clone();
        updated.status = transition.target();
        if transition == Transition::Cancel {
            updated.cancel_reason = reason;
        }
        let released = if transition.releases_slot() {
            self.released_slot(slot_id).await?
        } else {
            None
        };
        self.store.transition(updated.clone(), released).await?;

        info!(
            %booking_id,
            %slot_id,
            from = %current.status,
            to = %updated.status,
            "booking {}",
            transition.label()
        );
        self.notify.send(
            updated.facility_id,
            Event::BookingTransitioned {
                booking_id,
                facility_id: updated.facility_id,
                slot_id,
                from: current.status,
                to: updated.status,
            },
        );
        Ok(updated)
    }

    /// The slot as it becomes once its booking lets go: BOOKED → AVAILABLE.
    /// Slots in any other status are left as they are.
    async fn released_slot(&self, slot_id: Ulid) -> Result<Option<Slot>, EngineError> {
        let Some(mut slot) = self.store.find_slot(slot_id).await? else {
            warn!(%slot_id, "released booking references a missing slot");
            return Ok(None);
        };
        if slot.status != SlotStatus::Booked {
            return Ok(None);
        }
        slot.status = SlotStatus::Available;
        Ok(Some(slot))
    }
}
