use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::generator;
use crate::limits::MAX_GENERATION_DAYS;
use crate::model::{Event, Slot};
use crate::observability::{self, SLOTS_GENERATED_TOTAL};

use super::{Engine, EngineError};

impl Engine {
    /// Materialize slots for every open day in `[start_date, end_date]`.
    ///
    /// Days that already have slots are left alone, so repeating a call is a
    /// no-op. Returns only the slots created by this call. Each day commits on
    /// its own; a storage failure leaves earlier days in place.
    pub async fn generate_slots(
        &self,
        facility_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        let started = Instant::now();
        let result = self.generate_slots_inner(facility_id, start_date, end_date).await;
        observability::record_operation("generate_slots", started, &result);
        result
    }

    async fn generate_slots_inner(
        &self,
        facility_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Slot>, EngineError> {
        if start_date > end_date {
            return Err(EngineError::InvalidArgument(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        let days = (end_date - start_date).num_days() + 1;
        if days > MAX_GENERATION_DAYS {
            return Err(EngineError::InvalidArgument(format!(
                "cannot generate {days} days at once (max {MAX_GENERATION_DAYS})"
            )));
        }

        let facility = self.load_active_facility(facility_id).await?;
        let policy = facility.policy;
        policy.validate()?;

        let window_end = policy.window_end(self.clock.today());
        if end_date > window_end {
            return Err(EngineError::InvalidArgument(format!(
                "end_date {end_date} is beyond the booking window (last bookable date {window_end})"
            )));
        }

        let plan = generator::generate_range(facility_id, &policy, start_date, end_date);
        let mut created = Vec::new();
        for (date, slots) in plan {
            let _guard = self.day_locks.lock((facility_id, date)).await;
            if self.store.exists_slots_for(facility_id, date).await? {
                debug!(%facility_id, %date, "slots already generated, skipping day");
                continue;
            }
            let count = slots.len();
            self.store.save_slots(slots.clone()).await?;
            metrics::counter!(SLOTS_GENERATED_TOTAL).increment(count as u64);
            self.notify.send(facility_id, Event::SlotsGenerated { facility_id, date, count });
            created.extend(slots);
        }
        self.day_locks.prune();

        info!(
            %facility_id,
            %start_date,
            %end_date,
            created = created.len(),
            "slot generation finished"
        );
        Ok(created)
    }
}
