use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub date: OffsetDateTime,
    pub capacity: i32,
    pub available_seats: i32,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Event {
    /// Seats held by existing bookings.
    pub fn booked_seats(&self) -> i32 {
        self.capacity - self.available_seats
    }

    /// Returns the event with `changes` applied. A capacity change shifts
    /// `available_seats` by the same delta, so booked seats stay constant; a
    /// capacity below the booked count is refused rather than clamped.
    pub fn apply(&self, changes: &EventChanges, now: OffsetDateTime) -> EventUpdate {
        let mut next = self.clone();
        if let Some(name) = &changes.name {
            next.name = name.clone();
        }
        if let Some(date) = changes.date {
            next.date = date;
        }
        if let Some(capacity) = changes.capacity {
            let booked = self.booked_seats();
            if capacity < booked {
                return EventUpdate::CapacityBelowBooked { booked };
            }
            next.available_seats = self.available_seats + (capacity - self.capacity);
            next.capacity = capacity;
        }
        next.updated_at = now;
        EventUpdate::Updated(next)
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub date: OffsetDateTime,
    pub capacity: i32,
    pub created_by: Uuid,
}

/// Validated partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub name: Option<String>,
    pub date: Option<OffsetDateTime>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventUpdate {
    Updated(Event),
    NotFound,
    CapacityBelowBooked { booked: i32 },
}

/// Inclusive bounds on the event date.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.start.map_or(true, |s| event.date >= s) && self.end.map_or(true, |e| event.date <= e)
    }
}

/// Event with its creator resolved.
#[derive(Debug, Clone)]
pub struct EventDetails {
    pub event: Event,
    pub creator: UserSummary,
}

#[derive(Debug, FromRow)]
pub struct EventDetailsRow {
    pub id: Uuid,
    pub name: String,
    pub date: OffsetDateTime,
    pub capacity: i32,
    pub available_seats: i32,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub creator_name: String,
    pub creator_email: String,
}

impl From<EventDetailsRow> for EventDetails {
    fn from(r: EventDetailsRow) -> Self {
        Self {
            creator: UserSummary {
                id: r.created_by,
                name: r.creator_name,
                email: r.creator_email,
            },
            event: Event {
                id: r.id,
                name: r.name,
                date: r.date,
                capacity: r.capacity,
                available_seats: r.available_seats,
                created_by: r.created_by,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
        }
    }
}

/// The slice of an event embedded in booking responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub capacity: i32,
}

impl From<&Event> for EventSummary {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            date: e.date,
            capacity: e.capacity,
        }
    }
}
