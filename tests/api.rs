//! End-to-end tests driving the REST surface of a real server instance.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use ulid::Ulid;

use innkeep::auth::{Actor, Role, TokenRegistry};
use innkeep::engine::Engine;
use innkeep::http::{router, AppState};
use innkeep::notify::NotificationHub;

const DAY: i64 = 86_400_000;
const T0: i64 = 1_760_000_000_000;

const USER_TOKEN: &str = "user-token";
const OTHER_TOKEN: &str = "other-token";
const ADMIN_TOKEN: &str = "admin-token";

struct TestServer {
    base: String,
    client: reqwest::Client,
}

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("innkeep_test_api");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

async fn spawn_server(name: &str) -> TestServer {
    let engine = Arc::new(
        Engine::new(test_wal_path(name), Arc::new(NotificationHub::new())).unwrap(),
    );
    let auth = Arc::new(TokenRegistry::new([
        (
            USER_TOKEN.to_string(),
            Actor {
                id: Ulid::new(),
                role: Role::User,
            },
        ),
        (
            OTHER_TOKEN.to_string(),
            Actor {
                id: Ulid::new(),
                role: Role::User,
            },
        ),
        (
            ADMIN_TOKEN.to_string(),
            Actor {
                id: Ulid::new(),
                role: Role::Admin,
            },
        ),
    ]));
    let app = router(AppState { engine, auth });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    async fn post(&self, token: &str, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn patch(&self, token: &str, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .patch(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, token: &str, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn create_room(&self) -> String {
        let (status, room) = self
            .post(ADMIN_TOKEN, "/api/admin/rooms", json!({ "name": "Deluxe 101" }))
            .await;
        assert_eq!(status, 201);
        room["id"].as_str().unwrap().to_string()
    }

    async fn create_booking(&self, room: &str, check_in: i64, check_out: i64) -> (u16, Value) {
        self.post(
            USER_TOKEN,
            "/api/bookings",
            json!({
                "roomId": room,
                "checkIn": check_in,
                "checkOut": check_out,
                "guests": 2,
                "rooms": 1,
                "totalPrice": 4200,
                "roomPrice": 3500,
                "taxes": 500,
                "serviceCharges": 200,
                "guestName": "Asha Rao",
                "guestEmail": "asha@example.com",
                "guestPhone": "9900112233",
            }),
        )
        .await
    }
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let server = spawn_server("no_token.wal").await;
    let resp = reqwest::Client::new()
        .get(format!("{}/api/bookings", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let (status, _) = server.get("wrong-token", "/api/bookings").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn booking_creation_returns_201_with_the_record() {
    let server = spawn_server("create.wal").await;
    let room = server.create_room().await;

    let (status, booking) = server.create_booking(&room, T0, T0 + 2 * DAY).await;
    assert_eq!(status, 201);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["paymentStatus"], "pending");
    assert_eq!(booking["idVerified"], "pending");
    assert_eq!(booking["checkIn"], T0);
    assert_eq!(booking["checkOut"], T0 + 2 * DAY);
    assert_eq!(booking["roomId"], room);
    assert!(booking.get("cancelledAt").is_none());
}

#[tokio::test]
async fn conflicting_creation_returns_the_shifted_stay() {
    let server = spawn_server("shift.wal").await;
    let room = server.create_room().await;

    let (status, _) = server.create_booking(&room, T0, T0 + 2 * DAY).await;
    assert_eq!(status, 201);

    let (status, booking) = server.create_booking(&room, T0 + DAY, T0 + 3 * DAY).await;
    assert_eq!(status, 201);
    assert_eq!(booking["checkIn"], T0 + 2 * DAY);
    assert_eq!(booking["checkOut"], T0 + 4 * DAY);
}

#[tokio::test]
async fn missing_fields_are_a_400() {
    let server = spawn_server("missing.wal").await;
    let room = server.create_room().await;

    let (status, body) = server
        .post(
            USER_TOKEN,
            "/api/bookings",
            json!({ "roomId": room, "checkIn": T0, "checkOut": T0 + DAY }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Missing required booking fields");
}

#[tokio::test]
async fn admins_get_403_on_booking_creation() {
    let server = spawn_server("admin_create.wal").await;
    let room = server.create_room().await;

    let (status, body) = server
        .post(
            ADMIN_TOKEN,
            "/api/bookings",
            json!({
                "roomId": room,
                "checkIn": T0,
                "checkOut": T0 + DAY,
                "guests": 1,
                "rooms": 1,
                "totalPrice": 1000,
                "roomPrice": 900,
                "taxes": 50,
                "serviceCharges": 50,
                "guestName": "A",
                "guestEmail": "a@example.com",
                "guestPhone": "1",
            }),
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], "Admins cannot create bookings");
}

#[tokio::test]
async fn unknown_room_is_a_404() {
    let server = spawn_server("no_room.wal").await;
    let (status, _) = server
        .create_booking(&Ulid::new().to_string(), T0, T0 + DAY)
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn check_in_is_gated_on_verification_then_allowed() {
    let server = spawn_server("checkin.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/status"),
            json!({ "status": "checked-in" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "ID verification is required before check-in");

    // Booking unchanged.
    let (_, stored) = server.get(USER_TOKEN, &format!("/api/bookings/{id}")).await;
    assert_eq!(stored["status"], "confirmed");

    let (status, verified) = server
        .patch(
            ADMIN_TOKEN,
            &format!("/api/admin/bookings/{id}/id-verified"),
            json!({ "idVerified": "approved" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(verified["idVerified"], "approved");

    let (status, checked_in) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/status"),
            json!({ "status": "checked-in" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(checked_in["status"], "checked-in");
}

#[tokio::test]
async fn approved_verification_cannot_be_reverted() {
    let server = spawn_server("verify_lock.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    server
        .patch(
            ADMIN_TOKEN,
            &format!("/api/admin/bookings/{id}/id-verified"),
            json!({ "idVerified": "approved" }),
        )
        .await;

    let (status, body) = server
        .patch(
            ADMIN_TOKEN,
            &format!("/api/admin/bookings/{id}/id-verified"),
            json!({ "idVerified": "rejected" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Approved ID verification cannot be changed");

    let (_, stored) = server.get(USER_TOKEN, &format!("/api/bookings/{id}")).await;
    assert_eq!(stored["idVerified"], "approved");
}

#[tokio::test]
async fn verification_endpoint_rejects_non_admins() {
    let server = spawn_server("verify_role.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = server
        .patch(
            USER_TOKEN,
            &format!("/api/admin/bookings/{id}/id-verified"),
            json!({ "idVerified": "approved" }),
        )
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn unknown_status_values_are_a_400() {
    let server = spawn_server("bad_status.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/status"),
            json!({ "status": "checkedin" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid status");
}

#[tokio::test]
async fn cancellation_sets_cancelled_at_and_blocks_payment() {
    let server = spawn_server("cancel_pay.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, cancelled) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/status"),
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["cancelledAt"].is_i64());

    let (status, body) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/payment-status"),
            json!({ "paymentStatus": "paid" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Cancelled bookings cannot be paid");
}

#[tokio::test]
async fn payment_status_updates_for_the_owner() {
    let server = spawn_server("pay.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, paid) = server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/payment-status"),
            json!({ "paymentStatus": "paid" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(paid["paymentStatus"], "paid");

    // Another user cannot touch it.
    let (status, _) = server
        .patch(
            OTHER_TOKEN,
            &format!("/api/bookings/{id}/payment-status"),
            json!({ "paymentStatus": "failed" }),
        )
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn bookings_are_invisible_to_strangers() {
    let server = spawn_server("visibility.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = server.get(OTHER_TOKEN, &format!("/api/bookings/{id}")).await;
    assert_eq!(status, 403);

    let (status, list) = server.get(OTHER_TOKEN, "/api/bookings").await;
    assert_eq!(status, 200);
    assert_eq!(list.as_array().unwrap().len(), 0);

    let (status, list) = server.get(USER_TOKEN, "/api/bookings").await;
    assert_eq!(status, 200);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_surface_lists_bookings_rooms_and_stats() {
    let server = spawn_server("admin_surface.wal").await;
    let room = server.create_room().await;
    server.create_booking(&room, T0, T0 + DAY).await;

    let (status, bookings) = server.get(ADMIN_TOKEN, "/api/admin/bookings").await;
    assert_eq!(status, 200);
    assert_eq!(bookings.as_array().unwrap().len(), 1);

    let (status, rooms) = server.get(ADMIN_TOKEN, "/api/admin/rooms").await;
    assert_eq!(status, 200);
    assert_eq!(rooms[0]["name"], "Deluxe 101");

    let (status, stats) = server.get(ADMIN_TOKEN, "/api/admin/stats").await;
    assert_eq!(status, 200);
    assert_eq!(stats["totalRooms"], 1);
    assert_eq!(stats["confirmedBookings"], 1);
    assert_eq!(stats["totalRevenue"], 4200.0);

    // The admin surface is closed to regular users.
    for path in ["/api/admin/bookings", "/api/admin/rooms", "/api/admin/stats"] {
        let (status, _) = server.get(USER_TOKEN, path).await;
        assert_eq!(status, 403);
    }
    let (status, _) = server
        .post(USER_TOKEN, "/api/admin/rooms", json!({ "name": "Hack" }))
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn lifecycle_notifications_reach_the_feed() {
    let server = spawn_server("notify.wal").await;
    let room = server.create_room().await;
    let (_, booking) = server.create_booking(&room, T0, T0 + DAY).await;
    let id = booking["id"].as_str().unwrap();
    server
        .patch(
            USER_TOKEN,
            &format!("/api/bookings/{id}/status"),
            json!({ "status": "cancelled" }),
        )
        .await;

    // The outbox drains in the background.
    let mut titles = Vec::new();
    for _ in 0..100 {
        let (_, feed) = server.get(USER_TOKEN, "/api/notifications").await;
        titles = feed
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect();
        if titles.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(titles, vec!["Booking Confirmed", "Booking Cancelled"]);
}
