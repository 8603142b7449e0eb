//! Slot grid generation from a facility's weekly operating hours.
//!
//! Pure functions: no store access, no clock. The engine decides which days
//! still need slots and persists the result.

use chrono::{NaiveDate, NaiveTime, Timelike};
use ulid::Ulid;

use crate::model::Slot;
use crate::policy::FacilityPolicy;

const SECS_PER_MINUTE: u32 = 60;

/// Slots for a single day, ordered by start time.
///
/// Starting at `open_time`, emits `[cursor, cursor + min_booking_minutes)` while the
/// slot still ends at or before `close_time`, then advances the cursor past the slot
/// and the buffer. A trailing remainder shorter than a slot is left unused.
pub fn generate_day(facility_id: Ulid, policy: &FacilityPolicy, date: NaiveDate) -> Vec<Slot> {
    let Some(hours) = policy.hours_for(date) else {
        return Vec::new();
    };
    if policy.min_booking_minutes == 0 || hours.window_minutes() < i64::from(policy.min_booking_minutes) {
        return Vec::new();
    }

    let len = policy.min_booking_minutes * SECS_PER_MINUTE;
    let step = len + policy.buffer_minutes * SECS_PER_MINUTE;
    let close = hours.close_time.num_seconds_from_midnight();

    let mut slots = Vec::new();
    let mut cursor = hours.open_time.num_seconds_from_midnight();
    while cursor + len <= close {
        let (Some(start), Some(end)) = (time_at(cursor), time_at(cursor + len)) else {
            break;
        };
        slots.push(Slot::new(facility_id, date, start, end));
        cursor += step;
    }
    slots
}

/// Slots for every day in `[start, end]`, grouped per day. Days without slots are
/// omitted. Callers validate `start <= end`; an inverted range yields nothing.
pub fn generate_range(
    facility_id: Ulid,
    policy: &FacilityPolicy,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, Vec<Slot>)> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter_map(|d| {
            let slots = generate_day(facility_id, policy, d);
            (!slots.is_empty()).then_some((d, slots))
        })
        .collect()
}

fn time_at(secs: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::OperatingHours;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2026-03-02 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn policy(len: u32, buffer: u32, hours: Vec<OperatingHours>) -> FacilityPolicy {
        FacilityPolicy {
            min_booking_minutes: len,
            max_booking_minutes: len.max(120),
            buffer_minutes: buffer,
            booking_window_days: 30,
            requires_subscription: false,
            operating_hours: hours,
        }
    }

    fn times(slots: &[Slot]) -> Vec<(NaiveTime, NaiveTime)> {
        slots.iter().map(|s| (s.start_time, s.end_time)).collect()
    }

    #[test]
    fn back_to_back_hours() {
        let p = policy(60, 0, vec![OperatingHours::open(1, t(9, 0), t(12, 0))]);
        let slots = generate_day(Ulid::new(), &p, monday());
        assert_eq!(
            times(&slots),
            vec![(t(9, 0), t(10, 0)), (t(10, 0), t(11, 0)), (t(11, 0), t(12, 0))]
        );
    }

    #[test]
    fn buffer_drops_trailing_partial_slot() {
        let p = policy(60, 15, vec![OperatingHours::open(1, t(9, 0), t(12, 0))]);
        let slots = generate_day(Ulid::new(), &p, monday());
        // 11:15–12:15 would run past close.
        assert_eq!(times(&slots), vec![(t(9, 0), t(10, 0)), (t(10, 15), t(11, 15))]);
    }

    #[test]
    fn slot_ending_exactly_at_close_is_kept() {
        let p = policy(45, 0, vec![OperatingHours::open(1, t(9, 0), t(10, 30))]);
        let slots = generate_day(Ulid::new(), &p, monday());
        assert_eq!(times(&slots), vec![(t(9, 0), t(9, 45)), (t(9, 45), t(10, 30))]);
    }

    #[test]
    fn window_shorter_than_slot_yields_nothing() {
        let p = policy(90, 0, vec![OperatingHours::open(1, t(9, 0), t(10, 0))]);
        assert!(generate_day(Ulid::new(), &p, monday()).is_empty());
    }

    #[test]
    fn closed_and_missing_weekdays_yield_nothing() {
        let p = policy(
            60,
            0,
            vec![OperatingHours::open(1, t(9, 0), t(12, 0)), OperatingHours::closed(2)],
        );
        let fid = Ulid::new();
        assert!(generate_day(fid, &p, monday().succ_opt().unwrap()).is_empty());
        assert!(generate_day(fid, &p, monday() + chrono::Days::new(2)).is_empty());
    }

    #[test]
    fn no_hours_at_all_yields_nothing() {
        let p = policy(60, 0, vec![]);
        let out = generate_range(Ulid::new(), &p, monday(), monday() + chrono::Days::new(6));
        assert!(out.is_empty());
    }

    #[test]
    fn slots_carry_facility_date_and_available_status() {
        let fid = Ulid::new();
        let p = policy(30, 0, vec![OperatingHours::open(1, t(9, 0), t(10, 0))]);
        for s in generate_day(fid, &p, monday()) {
            assert_eq!(s.facility_id, fid);
            assert_eq!(s.date, monday());
            assert!(s.is_available());
        }
    }

    #[test]
    fn range_groups_by_open_day() {
        let p = policy(
            60,
            0,
            vec![
                OperatingHours::open(1, t(9, 0), t(11, 0)),
                OperatingHours::open(3, t(14, 0), t(15, 0)),
            ],
        );
        let out = generate_range(Ulid::new(), &p, monday(), monday() + chrono::Days::new(6));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, monday());
        assert_eq!(out[0].1.len(), 2);
        assert_eq!(out[1].0, monday() + chrono::Days::new(2));
        assert_eq!(out[1].1.len(), 1);
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let p = policy(60, 0, vec![OperatingHours::open(1, t(9, 0), t(12, 0))]);
        let out = generate_range(Ulid::new(), &p, monday(), monday().pred_opt().unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn window_reaching_end_of_day() {
        let p = policy(60, 0, vec![OperatingHours::open(1, t(22, 0), NaiveTime::from_hms_opt(23, 59, 59).unwrap())]);
        let slots = generate_day(Ulid::new(), &p, monday());
        assert_eq!(times(&slots), vec![(t(22, 0), t(23, 0))]);
    }

    proptest! {
        #[test]
        fn generated_slots_stay_inside_window_without_overlap(
            open_min in 0u32..1380,
            span_min in 1u32..600,
            len in 5u32..240,
            buffer in 0u32..60,
            day_offset in 0u64..7,
        ) {
            let close_min = (open_min + span_min).min(1439);
            prop_assume!(close_min > open_min);
            let open = t(open_min / 60, open_min % 60);
            let close = t(close_min / 60, close_min % 60);
            let hours: Vec<_> = (1..=7).map(|d| OperatingHours::open(d, open, close)).collect();
            let p = policy(len, buffer, hours);
            let date = monday() + chrono::Days::new(day_offset);

            let slots = generate_day(Ulid::new(), &p, date);
            for s in &slots {
                prop_assert!(s.start_time >= open);
                prop_assert!(s.end_time <= close);
                prop_assert_eq!(s.duration_minutes(), i64::from(len));
            }
            for pair in slots.windows(2) {
                prop_assert!(!pair[0].overlaps(&pair[1]));
                let gap = (pair[1].start_time - pair[0].end_time).num_minutes();
                prop_assert_eq!(gap, i64::from(buffer));
            }
            // No room left for another slot after the last one.
            if let Some(last) = slots.last() {
                let next_start = (last.end_time - open).num_minutes() + i64::from(buffer + len);
                prop_assert!(i64::from(open_min) + next_start > i64::from(close_min));
            } else {
                prop_assert!(close_min - open_min < len);
            }
        }

        #[test]
        fn generation_is_deterministic_in_shape(
            len in 15u32..120,
            buffer in 0u32..30,
        ) {
            let p = policy(len, buffer, vec![OperatingHours::open(1, t(8, 0), t(18, 0))]);
            let a = generate_day(Ulid::new(), &p, monday());
            let b = generate_day(Ulid::new(), &p, monday());
            prop_assert_eq!(times(&a), times(&b));
        }
    }
}
