use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;
use crate::bookings::repo_types::BookingDetails;
use crate::events::repo_types::EventSummary;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: Option<String>,
    pub number_of_tickets: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BookingQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub user: UserSummary,
    pub event: EventSummary,
    pub number_of_tickets: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub booking_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<BookingDetails> for BookingResponse {
    fn from(d: BookingDetails) -> Self {
        Self {
            id: d.booking.id,
            user: d.user,
            event: d.event,
            number_of_tickets: d.booking.number_of_tickets,
            booking_date: d.booking.booking_date,
            created_at: d.booking.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_bookings: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub pagination: BookingPagination,
}
