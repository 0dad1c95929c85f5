use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Booking status. `pending`, `confirmed` and `checked-in` form the active
/// set; `checked-out` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "checked-in" => Some(Self::CheckedIn),
            "checked-out" => Some(Self::CheckedOut),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CheckedOut | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// ID-verification state. `approved` is sticky: once a record is approved it
/// can never move to another value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdVerification {
    Pending,
    Approved,
    Rejected,
}

impl IdVerification {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One room reservation. Never physically deleted — cancellation is a status
/// transition that sets `cancelled_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub user_id: Ulid,
    pub check_in: Ms,
    pub check_out: Ms,
    pub guests: u32,
    pub rooms: u32,
    /// Externally trusted total — never recomputed from the parts below.
    pub total_price: f64,
    pub room_price: f64,
    pub taxes: f64,
    pub service_charges: f64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub id_verified: IdVerification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Ms>,
    pub booked_at: Ms,
}

impl Booking {
    pub fn stay(&self) -> Span {
        Span::new(self.check_in, self.check_out)
    }

    /// Active bookings are the ones that block a room's calendar.
    pub fn is_active(&self) -> bool {
        self.status.is_active() && self.cancelled_at.is_none()
    }
}

/// Unvalidated booking creation payload, exactly as it arrives on the wire.
/// The lifecycle controller turns this into a `Booking` or rejects it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub room_id: Option<String>,
    pub check_in: Option<Ms>,
    pub check_out: Option<Ms>,
    pub guests: Option<f64>,
    pub rooms: Option<f64>,
    pub total_price: Option<f64>,
    pub room_price: Option<f64>,
    pub taxes: Option<f64>,
    pub service_charges: Option<f64>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

/// All bookings of one room, sorted by `check_in`.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub name: Option<String>,
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            bookings: Vec::new(),
        }
    }

    /// Insert keeping the vector sorted by `check_in`.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.check_in, |b| b.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Active bookings whose stay overlaps the query window.
    /// Binary search skips bookings starting at or after `query.end`.
    pub fn active_overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.check_in < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.check_out > query.start && b.is_active())
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: Option<String>,
    },
    BookingCreated {
        booking: Booking,
    },
    StatusChanged {
        id: Ulid,
        status: BookingStatus,
        cancelled_at: Option<Ms>,
    },
    PaymentChanged {
        id: Ulid,
        payment_status: PaymentStatus,
    },
    VerificationChanged {
        id: Ulid,
        id_verified: IdVerification,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyStats {
    pub total_rooms: usize,
    pub total_bookings: usize,
    pub confirmed_bookings: usize,
    pub total_revenue: f64,
    pub occupancy_rate: f64,
}

#[cfg(test)]
pub(crate) fn sample_booking(room_id: Ulid, check_in: Ms, check_out: Ms) -> Booking {
    Booking {
        id: Ulid::new(),
        room_id,
        user_id: Ulid::new(),
        check_in,
        check_out,
        guests: 2,
        rooms: 1,
        total_price: 4200.0,
        room_price: 3500.0,
        taxes: 500.0,
        service_charges: 200.0,
        guest_name: "Asha Rao".into(),
        guest_email: "asha@example.com".into(),
        guest_phone: "9900112233".into(),
        status: BookingStatus::Confirmed,
        payment_status: PaymentStatus::Pending,
        id_verified: IdVerification::Pending,
        cancelled_at: None,
        booked_at: 0,
    }
}
