//! Single authorization point for booking access. Every read and every
//! transition goes through here instead of ad-hoc role checks in handlers.

use crate::auth::{Actor, Role};
use crate::model::Booking;

/// Mutable facets of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingField {
    Status,
    Payment,
    Verification,
}

pub fn can_read(actor: &Actor, booking: &Booking) -> bool {
    actor.role == Role::Admin || booking.user_id == actor.id
}

pub fn can_mutate(actor: &Actor, booking: &Booking, field: BookingField) -> bool {
    match field {
        // Owner or admin may move the status machine.
        BookingField::Status => actor.role == Role::Admin || booking.user_id == actor.id,
        // Payment belongs to the owning user's flow only.
        BookingField::Payment => booking.user_id == actor.id,
        // Verification verdicts are an admin concern.
        BookingField::Verification => actor.role == Role::Admin,
    }
}
