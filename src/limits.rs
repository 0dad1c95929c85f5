//! Hard caps protecting the in-memory store from unbounded growth.

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 10_000;
pub const MAX_ROOM_NAME_LEN: usize = 256;
pub const MAX_GUEST_FIELD_LEN: usize = 256;

/// Widest accepted stay: one year.
pub const MAX_STAY_DURATION_MS: i64 = 366 * 24 * 3_600_000;

/// Accepted timestamp range: 2000-01-01 .. 3000-01-01, roughly.
pub const MIN_VALID_TIMESTAMP_MS: i64 = 946_684_800_000;
pub const MAX_VALID_TIMESTAMP_MS: i64 = 32_503_680_000_000;
