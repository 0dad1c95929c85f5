use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::auth::{Actor, Role};
use crate::limits::*;
use crate::model::*;
use crate::notify::Notification;
use crate::observability;

use super::availability::next_free_stay;
use super::policy::{self, BookingField};
use super::{Engine, EngineError};

const MISSING_FIELDS: &str = "Missing required booking fields";

/// Validated creation payload, price fields parsed and counts coerced.
struct NewBooking {
    room_id: Ulid,
    check_in: Ms,
    check_out: Ms,
    guests: u32,
    rooms: u32,
    total_price: f64,
    room_price: f64,
    taxes: f64,
    service_charges: f64,
    guest_name: String,
    guest_email: String,
    guest_phone: String,
}

fn required_text(value: &Option<String>) -> Result<String, EngineError> {
    let s = value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(EngineError::Validation(MISSING_FIELDS))?;
    if s.len() > MAX_GUEST_FIELD_LEN {
        return Err(EngineError::LimitExceeded("guest field too long"));
    }
    Ok(s.to_string())
}

fn required_amount(value: Option<f64>) -> Result<f64, EngineError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(EngineError::Validation(MISSING_FIELDS)),
    }
}

fn required_count(value: Option<f64>) -> Result<u32, EngineError> {
    let v = required_amount(value)?;
    if v < 1.0 {
        return Err(EngineError::Validation("guest and room counts must be at least 1"));
    }
    Ok(v as u32)
}

fn validate_request(req: &BookingRequest) -> Result<NewBooking, EngineError> {
    let room_id = req
        .room_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(EngineError::Validation(MISSING_FIELDS))?;
    let room_id =
        Ulid::from_string(room_id).map_err(|_| EngineError::Validation("invalid room id"))?;

    let check_in = req.check_in.ok_or(EngineError::Validation(MISSING_FIELDS))?;
    let check_out = req.check_out.ok_or(EngineError::Validation(MISSING_FIELDS))?;
    if check_out <= check_in {
        return Err(EngineError::Validation("check-out must be after check-in"));
    }
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&check_in)
        || !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&check_out)
    {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if check_out - check_in > MAX_STAY_DURATION_MS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }

    Ok(NewBooking {
        room_id,
        check_in,
        check_out,
        guests: required_count(req.guests)?,
        rooms: required_count(req.rooms)?,
        total_price: required_amount(req.total_price)?,
        room_price: required_amount(req.room_price)?,
        taxes: required_amount(req.taxes)?,
        service_charges: required_amount(req.service_charges)?,
        guest_name: required_text(&req.guest_name)?,
        guest_email: required_text(&req.guest_email)?,
        guest_phone: required_text(&req.guest_phone)?,
    })
}

/// The status machine. Same-status updates never reach this (no-op earlier);
/// everything not listed is a conflict.
fn transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    match (from, to) {
        (Pending, Confirmed) => true,
        (Confirmed, CheckedIn) => true,
        (CheckedIn, CheckedOut) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::CheckedIn => "checked_in",
        BookingStatus::CheckedOut => "checked_out",
        BookingStatus::Cancelled => "cancelled",
    }
}

impl Engine {
    /// Register a room. Admin only.
    pub async fn create_room(
        &self,
        actor: &Actor,
        name: Option<String>,
    ) -> Result<RoomInfo, EngineError> {
        if actor.role != Role::Admin {
            return Err(EngineError::Forbidden("Admin access required"));
        }
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_ROOM_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("room name too long"));
        }

        let id = Ulid::new();
        let event = Event::RoomCreated {
            id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        self.rooms
            .insert(id, Arc::new(RwLock::new(RoomState::new(id, name.clone()))));
        Ok(RoomInfo { id, name })
    }

    /// Create a room booking. Admins cannot hold bookings; a date conflict
    /// shifts the stay forward via the availability search instead of
    /// rejecting. Room bookings are born `confirmed`.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        req: &BookingRequest,
    ) -> Result<Booking, EngineError> {
        if actor.role == Role::Admin {
            return Err(EngineError::Forbidden("Admins cannot create bookings"));
        }
        let new = validate_request(req)?;

        let rs = self
            .room(&new.room_id)
            .ok_or(EngineError::NotFound("room", new.room_id))?;
        // Search and insert under one write lock: a concurrent creation for
        // this room serializes behind us and sees our booking.
        let mut guard = rs.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        let requested = Span::new(new.check_in, new.check_out);
        let stay = next_free_stay(&guard, requested);
        if stay != requested {
            metrics::counter!(observability::BOOKINGS_RESCHEDULED_TOTAL).increment(1);
            tracing::info!(
                room = %new.room_id,
                "requested stay [{}, {}) conflicts, rebooked to [{}, {})",
                requested.start,
                requested.end,
                stay.start,
                stay.end
            );
        }

        let booking = Booking {
            id: Ulid::new(),
            room_id: new.room_id,
            user_id: actor.id,
            check_in: stay.start,
            check_out: stay.end,
            guests: new.guests,
            rooms: new.rooms,
            total_price: new.total_price,
            room_price: new.room_price,
            taxes: new.taxes,
            service_charges: new.service_charges,
            guest_name: new.guest_name,
            guest_email: new.guest_email,
            guest_phone: new.guest_phone,
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            id_verified: IdVerification::Pending,
            cancelled_at: None,
            booked_at: now_ms(),
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        self.notify.enqueue(Notification::for_user(
            actor.id,
            "Booking Confirmed",
            format!(
                "Your booking for room {} is confirmed from {} to {}.",
                booking.room_id, booking.check_in, booking.check_out
            ),
        ));
        Ok(booking)
    }

    /// Move the booking status machine. Owner or admin.
    pub async fn set_status(
        &self,
        actor: &Actor,
        booking_id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let mut guard = self.booking_write(&booking_id).await?;
        let (current, id_verified, user_id, room_id) = {
            let b = guard
                .booking(&booking_id)
                .ok_or(EngineError::NotFound("booking", booking_id))?;
            if !policy::can_mutate(actor, b, BookingField::Status) {
                return Err(EngineError::Forbidden("Access denied"));
            }
            if b.status == status {
                return Ok(b.clone());
            }
            (b.status, b.id_verified, b.user_id, b.room_id)
        };

        if !transition_allowed(current, status) {
            return Err(EngineError::Conflict("invalid status transition"));
        }
        if status == BookingStatus::CheckedIn && id_verified != IdVerification::Approved {
            return Err(EngineError::Conflict(
                "ID verification is required before check-in",
            ));
        }

        let cancelled_at = (status == BookingStatus::Cancelled).then(now_ms);
        let event = Event::StatusChanged {
            id: booking_id,
            status,
            cancelled_at,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(
            observability::STATUS_TRANSITIONS_TOTAL,
            "status" => status_label(status)
        )
        .increment(1);

        match status {
            BookingStatus::Cancelled => self.notify.enqueue(Notification::for_user(
                user_id,
                "Booking Cancelled",
                format!("Your booking for room {room_id} has been cancelled."),
            )),
            BookingStatus::CheckedIn => self.notify.enqueue(Notification::for_user(
                user_id,
                "Checked In",
                format!("You have checked in to room {room_id}."),
            )),
            BookingStatus::CheckedOut => self.notify.enqueue(Notification::for_user(
                user_id,
                "Checked Out",
                format!("You have checked out from room {room_id}."),
            )),
            _ => {}
        }

        guard
            .booking(&booking_id)
            .cloned()
            .ok_or(EngineError::NotFound("booking", booking_id))
    }

    /// Record an ID-verification verdict. Admin only; `approved` is final.
    pub async fn set_verification(
        &self,
        actor: &Actor,
        booking_id: Ulid,
        id_verified: IdVerification,
    ) -> Result<Booking, EngineError> {
        let mut guard = self.booking_write(&booking_id).await?;
        {
            let b = guard
                .booking(&booking_id)
                .ok_or(EngineError::NotFound("booking", booking_id))?;
            if !policy::can_mutate(actor, b, BookingField::Verification) {
                return Err(EngineError::Forbidden("Admin access required"));
            }
            if b.id_verified == IdVerification::Approved && id_verified != IdVerification::Approved
            {
                return Err(EngineError::Conflict(
                    "Approved ID verification cannot be changed",
                ));
            }
            if b.id_verified == id_verified {
                return Ok(b.clone());
            }
        }

        let event = Event::VerificationChanged {
            id: booking_id,
            id_verified,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .booking(&booking_id)
            .cloned()
            .ok_or(EngineError::NotFound("booking", booking_id))
    }

    /// Record a payment outcome. Owner only; cancelled bookings reject any
    /// payment operation.
    pub async fn set_payment_status(
        &self,
        actor: &Actor,
        booking_id: Ulid,
        payment_status: PaymentStatus,
    ) -> Result<Booking, EngineError> {
        let mut guard = self.booking_write(&booking_id).await?;
        let user_id = {
            let b = guard
                .booking(&booking_id)
                .ok_or(EngineError::NotFound("booking", booking_id))?;
            if !policy::can_mutate(actor, b, BookingField::Payment) {
                return Err(EngineError::Forbidden("Access denied"));
            }
            if b.status == BookingStatus::Cancelled {
                return Err(EngineError::Conflict("Cancelled bookings cannot be paid"));
            }
            if b.payment_status == payment_status {
                return Ok(b.clone());
            }
            b.user_id
        };

        let event = Event::PaymentChanged {
            id: booking_id,
            payment_status,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        match payment_status {
            PaymentStatus::Paid => self.notify.enqueue(Notification::for_user(
                user_id,
                "Payment Successful",
                format!("Payment for booking {booking_id} was successful."),
            )),
            PaymentStatus::Failed => self.notify.enqueue(Notification::for_user(
                user_id,
                "Payment Failed",
                format!("Payment for booking {booking_id} failed."),
            )),
            PaymentStatus::Pending => {}
        }

        guard
            .booking(&booking_id)
            .cloned()
            .ok_or(EngineError::NotFound("booking", booking_id))
    }
}
