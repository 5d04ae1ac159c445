use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    handler::Handler,
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    bookings::{
        dto::{
            BookingListResponse, BookingPagination, BookingQuery, BookingResponse,
            CreateBookingRequest,
        },
        export, services,
    },
    common::{parse_id, ApiResponse, MessageResponse},
    error::AppResult,
    rate_limit::{self, RateLimits},
    state::AppState,
};

const BOOKING_NOT_FOUND: &str = "Booking not found";

pub fn booking_routes(limits: &RateLimits) -> Router<AppState> {
    Router::new()
        .route(
            "/bookings",
            get(list_bookings).post(create_booking.layer(middleware::from_fn_with_state(
                limits.booking.clone(),
                rate_limit::enforce,
            ))),
        )
        .route("/bookings/export", get(export_bookings))
        .route("/bookings/:id", get(get_booking).delete(cancel_booking))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<BookingResponse>>> {
    let Json(payload) = payload?;
    let details = services::create_booking(&state, &user, payload).await?;
    Ok(ApiResponse::new("Booking created successfully", details.into()))
}

#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<BookingQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<BookingListResponse>>> {
    let Query(query) = query?;
    let (bookings, total, page) = services::list_bookings(&state, &user, query).await?;
    Ok(ApiResponse::success(BookingListResponse {
        bookings: bookings.into_iter().map(Into::into).collect(),
        pagination: BookingPagination {
            current_page: page.page,
            total_pages: page.total_pages(total),
            total_bookings: total,
            limit: page.limit,
        },
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<BookingResponse>>> {
    let id = parse_id(&id, BOOKING_NOT_FOUND)?;
    let details = services::get_booking(&state, &user, id).await?;
    Ok(ApiResponse::success(details.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, BOOKING_NOT_FOUND)?;
    services::cancel_booking(&state, &user, id).await?;
    Ok(MessageResponse::new("Booking cancelled successfully"))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn export_bookings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Response> {
    let bookings = services::export_bookings(&state).await?;
    let body = export::render_csv(&bookings)?;
    let file_name = export::file_name(OffsetDateTime::now_utc())?;
    info!(rows = bookings.len(), file = %file_name, "bookings exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};
    use serde_json::json;
    use time::{Duration, OffsetDateTime};

    use crate::auth::repo_types::Role;
    use crate::test_support::{send_json, send_raw, TestApp};

    fn next_month() -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::days(30)
    }

    #[tokio::test]
    async fn book_then_cancel_over_http() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;
        let event = t.seed_event(&admin, "Gig", next_month(), 5).await;
        let token = t.token(&fan);

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/bookings",
            Some(&token),
            json!({"eventId": event.id, "numberOfTickets": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Booking created successfully");
        assert_eq!(body["result"]["numberOfTickets"], 2);
        assert_eq!(body["result"]["user"]["email"], "fan@example.com");
        assert_eq!(body["result"]["event"]["name"], "Gig");
        assert_eq!(body["result"]["event"]["capacity"], 5);
        assert_eq!(t.event(event.id).await.available_seats, 3);

        let id = body["result"]["id"].as_str().unwrap().to_string();
        let (status, body) = send_json(
            &t.app,
            Method::DELETE,
            &format!("/bookings/{id}"),
            Some(&token),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Booking cancelled successfully");
        assert_eq!(t.event(event.id).await.available_seats, 5);
    }

    #[tokio::test]
    async fn create_requires_token_and_fields() {
        let t = TestApp::new();
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;

        let (status, _) = send_json(
            &t.app,
            Method::POST,
            "/bookings",
            None,
            json!({"eventId": uuid::Uuid::new_v4(), "numberOfTickets": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send_json(
            &t.app,
            Method::POST,
            "/bookings",
            Some(&t.token(&fan)),
            json!({"numberOfTickets": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Event ID and number of tickets are required");
    }

    #[tokio::test]
    async fn get_checks_existence_then_ownership() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let owner = t.seed_user("Owner", "owner@example.com", Role::User).await;
        let other = t.seed_user("Other", "other@example.com", Role::User).await;
        let event = t.seed_event(&admin, "Gig", next_month(), 5).await;
        let booking = t.book(&owner, event.id, 1).await;

        let (status, body) = send_json(
            &t.app,
            Method::GET,
            "/bookings/nope",
            Some(&t.token(&other)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Booking not found");

        let uri = format!("/bookings/{}", booking.id);
        let (status, body) =
            send_json(&t.app, Method::GET, &uri, Some(&t.token(&other)), json!(null)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied");

        let (status, body) =
            send_json(&t.app, Method::GET, &uri, Some(&t.token(&admin)), json!(null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["user"]["name"], "Owner");
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;
        let first = t.seed_event(&admin, "First", next_month(), 5).await;
        let second = t.seed_event(&admin, "Second", next_month(), 5).await;
        t.book(&fan, first.id, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        t.book(&fan, second.id, 1).await;

        let (status, body) = send_json(
            &t.app,
            Method::GET,
            "/bookings?limit=1",
            Some(&t.token(&fan)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["result"]["bookings"][0]["event"]["name"], "Second");
        assert_eq!(
            body["result"]["pagination"],
            json!({"currentPage": 1, "totalPages": 2, "totalBookings": 2, "limit": 1})
        );
    }

    #[tokio::test]
    async fn export_is_admin_only_csv() {
        let t = TestApp::new();
        let admin = t.seed_user("Admin", "admin@example.com", Role::Admin).await;
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;

        let (status, body) = send_json(
            &t.app,
            Method::GET,
            "/bookings/export",
            Some(&t.token(&admin)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No bookings found to export");

        let event = t.seed_event(&admin, "Gig", next_month(), 5).await;
        t.book(&fan, event.id, 3).await;

        let (status, _) = send_json(
            &t.app,
            Method::GET,
            "/bookings/export",
            Some(&t.token(&fan)),
            json!(null),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, headers, bytes) =
            send_raw(&t.app, Method::GET, "/bookings/export", Some(&t.token(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"bookings-"));
        let csv = String::from_utf8(bytes).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Fan,fan@example.com,Gig,"));
    }

    #[tokio::test]
    async fn booking_create_is_rate_limited() {
        let t = TestApp::with_rate_limits();
        let fan = t.seed_user("Fan", "fan@example.com", Role::User).await;
        let token = t.token(&fan);
        for _ in 0..10 {
            let (status, _) =
                send_json(&t.app, Method::POST, "/bookings", Some(&token), json!({})).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        let (status, body) =
            send_json(&t.app, Method::POST, "/bookings", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["message"],
            "Too many booking requests from this IP, please try again later."
        );
    }
}
