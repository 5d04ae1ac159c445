use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;
use crate::error::AppError;
use crate::events::repo_types::{Event, EventSummary};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub number_of_tickets: i32,
    pub booking_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// Booking with its user and event resolved.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub user: UserSummary,
    pub event: EventSummary,
}

#[derive(Debug, FromRow)]
pub struct BookingDetailsRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub number_of_tickets: i32,
    pub booking_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub user_name: String,
    pub user_email: String,
    pub event_name: String,
    pub event_date: OffsetDateTime,
    pub event_capacity: i32,
}

impl From<BookingDetailsRow> for BookingDetails {
    fn from(r: BookingDetailsRow) -> Self {
        Self {
            user: UserSummary {
                id: r.user_id,
                name: r.user_name,
                email: r.user_email,
            },
            event: EventSummary {
                id: r.event_id,
                name: r.event_name,
                date: r.event_date,
                capacity: r.event_capacity,
            },
            booking: Booking {
                id: r.id,
                user_id: r.user_id,
                event_id: r.event_id,
                number_of_tickets: r.number_of_tickets,
                booking_date: r.booking_date,
                created_at: r.created_at,
            },
        }
    }
}

/// Outcome of an attempt to reserve seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Confirmed(Booking),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EventNotFound,
    EventPast,
    AlreadyBooked,
    InsufficientSeats { available: i32 },
}

/// Decides whether `tickets` seats may be taken from `event`. Every store runs
/// this while holding the event, so the answer cannot go stale before the write.
pub fn screen_reservation(
    event: Option<&Event>,
    already_booked: bool,
    tickets: i32,
    now: OffsetDateTime,
) -> Result<(), Rejection> {
    let event = event.ok_or(Rejection::EventNotFound)?;
    if event.date <= now {
        return Err(Rejection::EventPast);
    }
    if already_booked {
        return Err(Rejection::AlreadyBooked);
    }
    if event.available_seats < tickets {
        return Err(Rejection::InsufficientSeats {
            available: event.available_seats,
        });
    }
    Ok(())
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::EventNotFound => AppError::not_found("Event not found"),
            Rejection::EventPast => AppError::validation("Cannot book for past events"),
            Rejection::AlreadyBooked => AppError::conflict("You have already booked this event"),
            Rejection::InsufficientSeats { available } => {
                AppError::validation(format!("Only {available} seats available"))
            }
        }
    }
}
