use ulid::Ulid;

use crate::auth::{Actor, Role};
use crate::model::*;

use super::policy;
use super::{Engine, EngineError};

impl Engine {
    /// Fetch one booking. Owner or admin.
    pub async fn booking(&self, actor: &Actor, id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .room_of_booking(&id)
            .ok_or(EngineError::NotFound("booking", id))?;
        let rs = self
            .room(&room_id)
            .ok_or(EngineError::NotFound("room", room_id))?;
        let guard = rs.read().await;
        let booking = guard
            .booking(&id)
            .ok_or(EngineError::NotFound("booking", id))?;
        if !policy::can_read(actor, booking) {
            return Err(EngineError::Forbidden("Access denied"));
        }
        Ok(booking.clone())
    }

    /// All bookings owned by one user, ordered by check-in.
    pub async fn bookings_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        let mut out = Vec::new();
        for rs in self.room_snapshot() {
            let guard = rs.read().await;
            out.extend(guard.bookings.iter().filter(|b| b.user_id == user_id).cloned());
        }
        out.sort_by_key(|b| b.check_in);
        out
    }

    /// Every booking in the system. Admin only.
    pub async fn all_bookings(&self, actor: &Actor) -> Result<Vec<Booking>, EngineError> {
        if actor.role != Role::Admin {
            return Err(EngineError::Forbidden("Admin access required"));
        }
        let mut out = Vec::new();
        for rs in self.room_snapshot() {
            let guard = rs.read().await;
            out.extend(guard.bookings.iter().cloned());
        }
        out.sort_by_key(|b| b.check_in);
        Ok(out)
    }

    /// Registered rooms. Admin only.
    pub async fn list_rooms(&self, actor: &Actor) -> Result<Vec<RoomInfo>, EngineError> {
        if actor.role != Role::Admin {
            return Err(EngineError::Forbidden("Admin access required"));
        }
        let mut out = Vec::new();
        for rs in self.room_snapshot() {
            let guard = rs.read().await;
            out.push(RoomInfo {
                id: guard.id,
                name: guard.name.clone(),
            });
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Dashboard numbers. Admin only. Revenue sums every booking's trusted
    /// total, cancelled ones included; occupancy counts confirmed or
    /// checked-in bookings against the room count.
    pub async fn stats(&self, actor: &Actor) -> Result<OccupancyStats, EngineError> {
        if actor.role != Role::Admin {
            return Err(EngineError::Forbidden("Admin access required"));
        }

        let total_rooms = self.rooms.len();
        let mut total_bookings = 0usize;
        let mut confirmed_bookings = 0usize;
        let mut occupied = 0usize;
        let mut total_revenue = 0.0f64;

        for rs in self.room_snapshot() {
            let guard = rs.read().await;
            for b in &guard.bookings {
                total_bookings += 1;
                total_revenue += b.total_price;
                if b.status == BookingStatus::Confirmed {
                    confirmed_bookings += 1;
                }
                if matches!(b.status, BookingStatus::Confirmed | BookingStatus::CheckedIn) {
                    occupied += 1;
                }
            }
        }

        let occupancy_rate = if total_rooms == 0 {
            0.0
        } else {
            (occupied as f64 / total_rooms as f64 * 1000.0).round() / 10.0
        };

        Ok(OccupancyStats {
            total_rooms,
            total_bookings,
            confirmed_bookings,
            total_revenue,
            occupancy_rate,
        })
    }
}
