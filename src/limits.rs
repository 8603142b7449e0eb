/// Minutes in a calendar day. Slot times never cross midnight.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Widest date range a single `generate_slots` call may cover.
pub const MAX_GENERATION_DAYS: i64 = 366;

/// Widest date range a single `list_slots` call may cover.
pub const MAX_QUERY_DAYS: i64 = 366;

/// Upper bound for `FacilityPolicy::booking_window_days`.
pub const MAX_BOOKING_WINDOW_DAYS: u32 = 730;

pub const MAX_NOTES_LEN: usize = 1024;
pub const MAX_CANCEL_REASON_LEN: usize = 512;
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 128;
