use crate::model::*;

// ── Date-rebooking search ─────────────────────────────────────────

/// Maximum forward-search rounds. Reaching the cap is not an error: the last
/// computed candidate is returned best-effort.
pub const MAX_SEARCH_ROUNDS: usize = 50;

/// Resolve a requested stay against a room's active bookings.
///
/// Returns the request unchanged when no active booking overlaps it.
/// Otherwise the candidate start advances to the latest check-out among the
/// currently conflicting bookings, keeping the requested duration, and the
/// room is queried again — each round's conflicts depend on where the
/// candidate now sits. The new start is strictly past at least one previous
/// conflict's end, so the search makes forward progress every round.
///
/// Pure over `room`; the caller holds the room lock, so the booking set
/// cannot shift mid-search.
pub fn next_free_stay(room: &RoomState, requested: Span) -> Span {
    let duration = requested.duration_ms();
    let mut candidate = requested;

    for _ in 0..MAX_SEARCH_ROUNDS {
        let latest_check_out = room
            .active_overlapping(&candidate)
            .map(|b| b.check_out)
            .max();
        match latest_check_out {
            None => return candidate,
            Some(end) => candidate = Span::new(end, end + duration),
        }
    }

    candidate
}
