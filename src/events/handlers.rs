use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    common::{parse_id, ApiResponse, MessageResponse},
    error::AppResult,
    events::{
        dto::{
            CreateEventRequest, EventDetailsResponse, EventListResponse, EventPagination,
            EventQuery, EventResponse, UpdateEventRequest,
        },
        services,
    },
    state::AppState,
};

const EVENT_NOT_FOUND: &str = "Event not found";

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<EventResponse>>> {
    let Json(payload) = payload?;
    let event = services::create_event(&state, &admin, payload).await?;
    Ok(ApiResponse::new("Event created successfully", event.into()))
}

#[instrument(skip(state, query))]
pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<EventListResponse>>> {
    let Query(query) = query?;
    let (events, total, page) = services::list_events(&state, query).await?;
    Ok(ApiResponse::success(EventListResponse {
        events: events.into_iter().map(Into::into).collect(),
        pagination: EventPagination {
            current_page: page.page,
            total_pages: page.total_pages(total),
            total_events: total,
            limit: page.limit,
        },
    }))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<EventDetailsResponse>>> {
    let id = parse_id(&id, EVENT_NOT_FOUND)?;
    let details = services::get_event(&state, id).await?;
    Ok(ApiResponse::success(details.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<EventResponse>>> {
    let id = parse_id(&id, EVENT_NOT_FOUND)?;
    let Json(payload) = payload?;
    let event = services::update_event(&state, &user, id, payload).await?;
    Ok(ApiResponse::new("Event updated successfully", event.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, EVENT_NOT_FOUND)?;
    services::delete_event(&state, &user, id).await?;
    Ok(MessageResponse::new("Event deleted successfully"))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use time::{macros::datetime, Duration, OffsetDateTime};

    use crate::auth::repo_types::Role;
    use crate::test_support::{send_json, TestApp};

    fn in_days(days: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::days(days)
    }

    #[tokio::test]
    async fn admin_creates_event_with_all_seats_available() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let token = t.token(&admin);

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/events",
            Some(&token),
            json!({"name": "Rust Conf", "date": "2999-06-01", "capacity": 100}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Event created successfully");
        assert_eq!(body["result"]["name"], "Rust Conf");
        assert_eq!(body["result"]["capacity"], 100);
        assert_eq!(body["result"]["availableSeats"], 100);
        assert_eq!(body["result"]["createdBy"], admin.id.to_string());
        assert_eq!(body["result"]["date"], "2999-06-01T00:00:00Z");
    }

    #[tokio::test]
    async fn create_requires_admin_and_token() {
        let t = TestApp::new();
        let user = t.seed_user("User", "user@example.com", Role::User).await;
        let payload = json!({"name": "Gig", "date": "2999-06-01", "capacity": 10});

        let (status, body) =
            send_json(&t.app, Method::POST, "/events", None, payload.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No token, authorization denied");

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/events",
            Some("not-a-jwt"),
            payload.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token is not valid");

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/events",
            Some(&t.token(&user)),
            payload,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied. Admin role required.");
    }

    #[tokio::test]
    async fn create_rejects_past_date_and_zero_capacity() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let token = t.token(&admin);

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/events",
            Some(&token),
            json!({"name": "Old", "date": "2000-01-01", "capacity": 10}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Event date must be in the future");

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/events",
            Some(&token),
            json!({"name": "Empty", "date": "2999-01-01", "capacity": 0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Capacity must be at least 1");
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        t.seed_event(&admin, "March", datetime!(2999-03-01 0:00 UTC), 10).await;
        t.seed_event(&admin, "January", datetime!(2999-01-01 0:00 UTC), 10).await;
        t.seed_event(&admin, "February", datetime!(2999-02-01 0:00 UTC), 10).await;

        let (status, body) =
            send_json(&t.app, Method::GET, "/events?limit=2", None, json!(null)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "success");
        let names: Vec<_> = body["result"]["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["January", "February"]);
        assert_eq!(body["result"]["events"][0]["createdBy"]["email"], "admin@example.com");
        assert_eq!(
            body["result"]["pagination"],
            json!({"currentPage": 1, "totalPages": 2, "totalEvents": 3, "limit": 2})
        );

        let (_, body) = send_json(
            &t.app,
            Method::GET,
            "/events?start=2999-02-01&end=2999-03-01",
            None,
            json!(null),
        )
        .await;
        assert_eq!(body["result"]["pagination"]["totalEvents"], 2);
        assert_eq!(body["result"]["events"][0]["name"], "February");
        assert_eq!(body["result"]["events"][1]["name"], "March");
    }

    #[tokio::test]
    async fn list_rejects_bad_filters() {
        let t = TestApp::new();
        let (status, body) =
            send_json(&t.app, Method::GET, "/events?start=whenever", None, json!(null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid start date");

        let (status, _) =
            send_json(&t.app, Method::GET, "/events?page=0", None, json!(null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_returns_details_or_not_found() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let event = t.seed_event(&admin, "Gig", in_days(30), 5).await;

        let (status, body) = send_json(
            &t.app,
            Method::GET,
            &format!("/events/{}", event.id),
            None,
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["createdBy"]["name"], "Admin");
        assert_eq!(body["result"]["availableSeats"], 5);

        let (status, body) =
            send_json(&t.app, Method::GET, "/events/not-a-uuid", None, json!(null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Event not found");

        let (status, _) = send_json(
            &t.app,
            Method::GET,
            &format!("/events/{}", uuid::Uuid::new_v4()),
            None,
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn creator_updates_capacity_preserving_booked_seats() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;
        let event = t.seed_event(&admin, "Gig", in_days(30), 10).await;
        t.book(&fan, event.id, 4).await;

        let (status, body) = send_json(
            &t.app,
            Method::PUT,
            &format!("/events/{}", event.id),
            Some(&t.token(&admin)),
            json!({"capacity": 6}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Event updated successfully");
        assert_eq!(body["result"]["capacity"], 6);
        assert_eq!(body["result"]["availableSeats"], 2);

        let (status, body) = send_json(
            &t.app,
            Method::PUT,
            &format!("/events/{}", event.id),
            Some(&t.token(&admin)),
            json!({"capacity": 3}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Capacity cannot be less than 4 seats already booked"
        );
        let stored = t.event(event.id).await;
        assert_eq!((stored.capacity, stored.available_seats), (6, 2));
    }

    #[tokio::test]
    async fn update_checks_existence_before_ownership() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let other = t.seed_user("Other", "other@example.com", Role::User).await;
        let event = t.seed_event(&admin, "Gig", in_days(30), 10).await;
        let token = t.token(&other);

        let (status, _) = send_json(
            &t.app,
            Method::PUT,
            &format!("/events/{}", uuid::Uuid::new_v4()),
            Some(&token),
            json!({"name": "Mine"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send_json(
            &t.app,
            Method::PUT,
            &format!("/events/{}", event.id),
            Some(&token),
            json!({"name": "Mine"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["message"],
            "Access denied. You can only manage your own events or be an admin."
        );
    }

    #[tokio::test]
    async fn delete_cascades_to_bookings() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;
        let event = t.seed_event(&admin, "Gig", in_days(30), 10).await;
        let booking = t.book(&fan, event.id, 2).await;

        let (status, body) = send_json(
            &t.app,
            Method::DELETE,
            &format!("/events/{}", event.id),
            Some(&t.token(&admin)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Event deleted successfully");

        assert!(t.state.events.find_by_id(event.id).await.unwrap().is_none());
        assert!(t.state.bookings.find_details(booking.id).await.unwrap().is_none());

        let (status, _) = send_json(
            &t.app,
            Method::DELETE,
            &format!("/events/{}", event.id),
            Some(&t.token(&admin)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
