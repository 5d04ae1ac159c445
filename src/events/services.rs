use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::common::{parse_date, Page};
use crate::error::{AppError, AppResult};
use crate::events::dto::{CreateEventRequest, EventQuery, UpdateEventRequest};
use crate::events::repo_types::{
    Event, EventChanges, EventDetails, EventFilter, EventUpdate, NewEvent,
};
use crate::state::AppState;

fn parse_future_date(raw: &str, now: OffsetDateTime) -> AppResult<OffsetDateTime> {
    let date = parse_date(raw).ok_or_else(|| AppError::validation("Invalid event date"))?;
    if date <= now {
        return Err(AppError::validation("Event date must be in the future"));
    }
    Ok(date)
}

fn check_capacity(capacity: i32) -> AppResult<i32> {
    if capacity < 1 {
        return Err(AppError::validation("Capacity must be at least 1"));
    }
    Ok(capacity)
}

pub fn validate_new_event(
    req: CreateEventRequest,
    created_by: Uuid,
    now: OffsetDateTime,
) -> AppResult<NewEvent> {
    let (Some(name), Some(date), Some(capacity)) = (
        req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        req.date.filter(|d| !d.trim().is_empty()),
        req.capacity,
    ) else {
        return Err(AppError::validation("Name, date, and capacity are required"));
    };
    Ok(NewEvent {
        name,
        date: parse_future_date(&date, now)?,
        capacity: check_capacity(capacity)?,
        created_by,
    })
}

pub fn validate_changes(req: UpdateEventRequest, now: OffsetDateTime) -> AppResult<EventChanges> {
    let name = match req.name {
        Some(n) if n.trim().is_empty() => {
            return Err(AppError::validation("Event name cannot be empty"))
        }
        Some(n) => Some(n.trim().to_string()),
        None => None,
    };
    let date = req
        .date
        .map(|d| parse_future_date(&d, now))
        .transpose()?;
    let capacity = req.capacity.map(check_capacity).transpose()?;
    Ok(EventChanges {
        name,
        date,
        capacity,
    })
}

pub fn ensure_can_manage(actor: &User, event: &Event) -> AppResult<()> {
    if actor.is_admin() || event.created_by == actor.id {
        return Ok(());
    }
    warn!(user_id = %actor.id, event_id = %event.id, "event management denied");
    Err(AppError::forbidden(
        "Access denied. You can only manage your own events or be an admin.",
    ))
}

pub async fn create_event(
    state: &AppState,
    admin: &User,
    req: CreateEventRequest,
) -> AppResult<Event> {
    let new = validate_new_event(req, admin.id, OffsetDateTime::now_utc())?;
    let event = state.events.create(new).await?;
    info!(
        event_id = %event.id,
        capacity = event.capacity,
        created_by = %admin.id,
        "event created"
    );
    Ok(event)
}

pub async fn list_events(
    state: &AppState,
    query: EventQuery,
) -> AppResult<(Vec<EventDetails>, i64, Page)> {
    let page = Page::resolve(query.page, query.limit)?;
    let bound = |raw: Option<String>, what: &str| -> AppResult<Option<OffsetDateTime>> {
        match raw.filter(|r| !r.trim().is_empty()) {
            Some(r) => parse_date(&r)
                .map(Some)
                .ok_or_else(|| AppError::validation(format!("Invalid {what} date"))),
            None => Ok(None),
        }
    };
    let filter = EventFilter {
        start: bound(query.start, "start")?,
        end: bound(query.end, "end")?,
    };
    let (events, total) = state.events.list(&filter, page.limit, page.offset()).await?;
    Ok((events, total, page))
}

pub async fn get_event(state: &AppState, id: Uuid) -> AppResult<EventDetails> {
    state
        .events
        .find_details(id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))
}

async fn load_managed(state: &AppState, actor: &User, id: Uuid) -> AppResult<Event> {
    let event = state
        .events
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    ensure_can_manage(actor, &event)?;
    Ok(event)
}

pub async fn update_event(
    state: &AppState,
    actor: &User,
    id: Uuid,
    req: UpdateEventRequest,
) -> AppResult<Event> {
    load_managed(state, actor, id).await?;
    let changes = validate_changes(req, OffsetDateTime::now_utc())?;
    match state.events.update(id, changes).await? {
        EventUpdate::Updated(event) => {
            info!(
                event_id = %event.id,
                capacity = event.capacity,
                available_seats = event.available_seats,
                "event updated"
            );
            Ok(event)
        }
        EventUpdate::NotFound => Err(AppError::not_found("Event not found")),
        EventUpdate::CapacityBelowBooked { booked } => {
            warn!(event_id = %id, booked, "capacity below booked seats");
            Err(AppError::validation(format!(
                "Capacity cannot be less than {booked} seats already booked"
            )))
        }
    }
}

pub async fn delete_event(state: &AppState, actor: &User, id: Uuid) -> AppResult<()> {
    load_managed(state, actor, id).await?;
    if !state.events.delete_with_bookings(id).await? {
        return Err(AppError::not_found("Event not found"));
    }
    info!(event_id = %id, deleted_by = %actor.id, "event deleted");
    Ok(())
}
