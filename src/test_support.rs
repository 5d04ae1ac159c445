//! Router-level test harness over the in-memory store.

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lazy_static::lazy_static;
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_app;
use crate::auth::dto::JwtKeys;
use crate::auth::password::hash_password;
use crate::auth::repo_types::{NewUser, Role, User};
use crate::auth::repo::UserRepo;
use crate::bookings::repo_types::{Booking, Reservation};
use crate::db::PgStore;
use crate::events::repo::EventRepo;
use crate::events::repo_types::{Event, NewEvent};
use crate::state::AppState;

const SEED_PASSWORD: &str = "password123";

lazy_static! {
    // Hashing is slow in debug builds; seeded users share one hash.
    static ref SEED_HASH: String = hash_password(SEED_PASSWORD).unwrap();
}

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::from_state(AppState::fake())
    }

    pub fn with_rate_limits() -> Self {
        Self::from_state(AppState::fake_with(true))
    }

    fn from_state(state: AppState) -> Self {
        Self {
            app: build_app(state.clone()),
            state,
        }
    }

    pub async fn seed_user(&self, name: &str, email: &str, role: Role) -> User {
        self.insert_user(name, email, SEED_HASH.clone(), role).await
    }

    pub async fn seed_user_with_password(&self, name: &str, email: &str, password: &str) -> User {
        self.insert_user(name, email, hash_password(password).unwrap(), Role::User)
            .await
    }

    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: String,
        role: Role,
    ) -> User {
        self.state
            .users
            .create(NewUser {
                name: name.into(),
                email: email.into(),
                password_hash,
                role,
            })
            .await
            .unwrap()
            .expect("email already seeded")
    }

    pub fn token(&self, user: &User) -> String {
        JwtKeys::from_ref(&self.state).sign(user.id).unwrap()
    }

    /// Inserts directly through the store, so past dates are allowed.
    pub async fn seed_event(
        &self,
        creator: &User,
        name: &str,
        date: OffsetDateTime,
        capacity: i32,
    ) -> Event {
        self.state
            .events
            .create(NewEvent {
                name: name.into(),
                date,
                capacity,
                created_by: creator.id,
            })
            .await
            .unwrap()
    }

    pub async fn book(&self, user: &User, event_id: Uuid, tickets: i32) -> Booking {
        match self
            .state
            .bookings
            .reserve(user.id, event_id, tickets, OffsetDateTime::now_utc())
            .await
            .unwrap()
        {
            Reservation::Confirmed(b) => b,
            Reservation::Rejected(r) => panic!("seed booking rejected: {r:?}"),
        }
    }

    pub async fn event(&self, id: Uuid) -> Event {
        self.state.events.find_by_id(id).await.unwrap().expect("event exists")
    }
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req
}

/// Sends `body` as JSON unless it is `null`, and decodes the JSON reply.
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let req = request(method, uri, token);
    let req = if body.is_null() {
        req.body(Body::empty())
    } else {
        req.header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
    };
    send(app, req.unwrap()).await
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

/// Raw reply for non-JSON endpoints.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let req = request(method, uri, token).body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

/// Store on the database named by `TEST_DATABASE_URL`, migrated. `None` when the
/// variable is unset, so SQL tests are skipped on machines without Postgres.
pub async fn pg_store() -> Option<PgStore> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping postgres test");
        return None;
    };
    let store = PgStore::connect(&url, 16).await.expect("connect test database");
    store.migrate().await.expect("migrate test database");
    Some(store)
}

/// User with a unique email, so tests can share one database.
pub async fn pg_user(store: &PgStore, role: Role) -> User {
    let email = format!("{}@example.test", Uuid::new_v4());
    UserRepo::create(
        store,
        NewUser {
            name: "Pg Tester".into(),
            email,
            password_hash: SEED_HASH.clone(),
            role,
        },
    )
    .await
    .unwrap()
    .expect("fresh email")
}

pub async fn pg_event(store: &PgStore, creator: &User, capacity: i32) -> Event {
    EventRepo::create(
        store,
        NewEvent {
            name: "Pg Gig".into(),
            date: OffsetDateTime::now_utc() + time::Duration::days(30),
            capacity,
            created_by: creator.id,
        },
    )
    .await
    .unwrap()
}

/// Seats held by the event's bookings, summed in SQL.
pub async fn pg_booked_tickets(store: &PgStore, event_id: Uuid) -> i32 {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(SUM(number_of_tickets), 0)::int4 FROM bookings WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_one(&store.pool)
    .await
    .unwrap()
}
