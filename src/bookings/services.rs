use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::bookings::dto::{BookingQuery, CreateBookingRequest};
use crate::bookings::repo_types::{BookingDetails, Reservation};
use crate::common::Page;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const BOOKING_NOT_FOUND: &str = "Booking not found";

/// Parsed booking request: target event and ticket count.
pub fn validate_booking_request(req: CreateBookingRequest) -> AppResult<(Uuid, i32)> {
    let (Some(event_id), Some(tickets)) = (
        req.event_id.filter(|id| !id.trim().is_empty()),
        req.number_of_tickets,
    ) else {
        return Err(AppError::validation(
            "Event ID and number of tickets are required",
        ));
    };
    if tickets < 1 {
        return Err(AppError::validation("Number of tickets must be at least 1"));
    }
    let event_id =
        Uuid::parse_str(event_id.trim()).map_err(|_| AppError::validation("Invalid event ID"))?;
    Ok((event_id, tickets))
}

pub async fn create_booking(
    state: &AppState,
    user: &User,
    req: CreateBookingRequest,
) -> AppResult<BookingDetails> {
    let (event_id, tickets) = validate_booking_request(req)?;

    let booking = match state
        .bookings
        .reserve(user.id, event_id, tickets, OffsetDateTime::now_utc())
        .await?
    {
        Reservation::Confirmed(booking) => booking,
        Reservation::Rejected(rejection) => {
            warn!(
                user_id = %user.id,
                event_id = %event_id,
                tickets,
                ?rejection,
                "booking rejected"
            );
            return Err(rejection.into());
        }
    };
    info!(
        booking_id = %booking.id,
        user_id = %user.id,
        event_id = %event_id,
        tickets,
        "booking created"
    );

    state
        .bookings
        .find_details(booking.id)
        .await?
        .ok_or_else(|| AppError::not_found(BOOKING_NOT_FOUND))
}

fn ensure_can_access(actor: &User, owner: Uuid) -> AppResult<()> {
    if actor.is_admin() || actor.id == owner {
        return Ok(());
    }
    warn!(user_id = %actor.id, owner_id = %owner, "booking access denied");
    Err(AppError::forbidden("Access denied"))
}

pub async fn get_booking(state: &AppState, actor: &User, id: Uuid) -> AppResult<BookingDetails> {
    let details = state
        .bookings
        .find_details(id)
        .await?
        .ok_or_else(|| AppError::not_found(BOOKING_NOT_FOUND))?;
    ensure_can_access(actor, details.booking.user_id)?;
    Ok(details)
}

pub async fn cancel_booking(state: &AppState, actor: &User, id: Uuid) -> AppResult<()> {
    let booking = state
        .bookings
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found(BOOKING_NOT_FOUND))?;
    ensure_can_access(actor, booking.user_id)?;

    // A concurrent cancel may have released it between the lookup and here.
    let released = state
        .bookings
        .release(id)
        .await?
        .ok_or_else(|| AppError::not_found(BOOKING_NOT_FOUND))?;
    info!(
        booking_id = %released.id,
        event_id = %released.event_id,
        tickets = released.number_of_tickets,
        cancelled_by = %actor.id,
        "booking cancelled"
    );
    Ok(())
}

pub async fn list_bookings(
    state: &AppState,
    actor: &User,
    query: BookingQuery,
) -> AppResult<(Vec<BookingDetails>, i64, Page)> {
    let page = Page::resolve(query.page, query.limit)?;
    let owner = (!actor.is_admin()).then_some(actor.id);
    let (bookings, total) = state
        .bookings
        .list(owner, page.limit, page.offset())
        .await?;
    Ok((bookings, total, page))
}

pub async fn export_bookings(state: &AppState) -> AppResult<Vec<BookingDetails>> {
    let bookings = state.bookings.list_all().await?;
    if bookings.is_empty() {
        return Err(AppError::not_found("No bookings found to export"));
    }
    Ok(bookings)
}
