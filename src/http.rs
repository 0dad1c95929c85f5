use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::{header::AUTHORIZATION, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use ulid::Ulid;

use crate::auth::{Actor, Authenticator};
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::notify::Notification;
use crate::observability;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub auth: Arc<dyn Authenticator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bookings", post(create_booking).get(my_bookings))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/status", patch(update_status))
        .route(
            "/api/bookings/{id}/payment-status",
            patch(update_payment_status),
        )
        .route("/api/notifications", get(my_notifications))
        .route("/api/admin/rooms", post(create_room).get(list_rooms))
        .route("/api/admin/bookings", get(all_bookings))
        .route(
            "/api/admin/bookings/{id}/id-verified",
            patch(update_id_verified),
        )
        .route("/api/admin/stats", get(stats))
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────

pub enum ApiError {
    Unauthorized,
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid auth token".to_string(),
            ),
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::Validation(_) | EngineError::LimitExceeded(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    EngineError::NotFound(..) => StatusCode::NOT_FOUND,
                    EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
                    EngineError::Conflict(_) => StatusCode::CONFLICT,
                    EngineError::Wal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("request failed: {e}");
                    (status, "Internal server error".to_string())
                } else {
                    (status, e.to_string())
                }
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

// ── Auth extractor ───────────────────────────────────────

impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        state
            .auth
            .authenticate(token)
            .await
            .ok_or(ApiError::Unauthorized)
    }
}

fn booking_id(raw: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw)
        .map_err(|_| ApiError::Engine(EngineError::Validation("invalid booking id")))
}

// ── Request bodies ───────────────────────────────────────

#[derive(Deserialize)]
struct StatusUpdate {
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStatusUpdate {
    payment_status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdVerifiedUpdate {
    id_verified: Option<String>,
}

#[derive(Deserialize)]
struct CreateRoom {
    name: Option<String>,
}

// ── Booking handlers ─────────────────────────────────────

async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "create_booking").increment(1);
    let booking = state.engine.create_booking(&actor, &req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_bookings(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "my_bookings").increment(1);
    Ok(Json(state.engine.bookings_for_user(actor.id).await))
}

async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "get_booking").increment(1);
    let booking = state.engine.booking(&actor, booking_id(&id)?).await?;
    Ok(Json(booking))
}

async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Booking>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "update_status").increment(1);
    let status = body
        .status
        .as_deref()
        .and_then(BookingStatus::parse)
        .ok_or(ApiError::Engine(EngineError::Validation("Invalid status")))?;
    let booking = state
        .engine
        .set_status(&actor, booking_id(&id)?, status)
        .await?;
    Ok(Json(booking))
}

async fn update_payment_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<PaymentStatusUpdate>,
) -> Result<Json<Booking>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "update_payment_status")
        .increment(1);
    let payment_status = body
        .payment_status
        .as_deref()
        .and_then(PaymentStatus::parse)
        .ok_or(ApiError::Engine(EngineError::Validation(
            "Invalid payment status",
        )))?;
    let booking = state
        .engine
        .set_payment_status(&actor, booking_id(&id)?, payment_status)
        .await?;
    Ok(Json(booking))
}

async fn my_notifications(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Notification>>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "my_notifications").increment(1);
    Ok(Json(state.engine.notify.feed_for(&actor.id)))
}

// ── Admin handlers ───────────────────────────────────────

async fn create_room(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateRoom>,
) -> Result<impl IntoResponse, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "create_room").increment(1);
    let room = state.engine.create_room(&actor, body.name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<RoomInfo>>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "list_rooms").increment(1);
    Ok(Json(state.engine.list_rooms(&actor).await?))
}

async fn all_bookings(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "all_bookings").increment(1);
    Ok(Json(state.engine.all_bookings(&actor).await?))
}

async fn update_id_verified(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<IdVerifiedUpdate>,
) -> Result<Json<Booking>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "update_id_verified")
        .increment(1);
    let id_verified = body
        .id_verified
        .as_deref()
        .and_then(IdVerification::parse)
        .ok_or(ApiError::Engine(EngineError::Validation(
            "Invalid ID verification status",
        )))?;
    let booking = state
        .engine
        .set_verification(&actor, booking_id(&id)?, id_verified)
        .await?;
    Ok(Json(booking))
}

async fn stats(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<OccupancyStats>, ApiError> {
    metrics::counter!(observability::REQUESTS_TOTAL, "endpoint" => "stats").increment(1);
    Ok(Json(state.engine.stats(&actor).await?))
}
