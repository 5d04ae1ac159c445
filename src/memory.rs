//! In-process store used when no database is configured and by the tests.
//!
//! All tables sit behind one async mutex, so every repo operation is a single
//! critical section and seat accounting cannot interleave.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};
use crate::bookings::repo::BookingRepo;
use crate::bookings::repo_types::{screen_reservation, Booking, BookingDetails, Reservation};
use crate::events::repo::EventRepo;
use crate::events::repo_types::{
    Event, EventChanges, EventDetails, EventFilter, EventSummary, EventUpdate, NewEvent,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

impl Tables {
    fn event_details(&self, event: &Event) -> anyhow::Result<EventDetails> {
        let creator = self
            .users
            .get(&event.created_by)
            .ok_or_else(|| anyhow::anyhow!("event {} has no creator", event.id))?;
        Ok(EventDetails {
            event: event.clone(),
            creator: creator.summary(),
        })
    }

    fn booking_details(&self, booking: &Booking) -> anyhow::Result<BookingDetails> {
        let user = self
            .users
            .get(&booking.user_id)
            .ok_or_else(|| anyhow::anyhow!("booking {} has no user", booking.id))?;
        let event = self
            .events
            .get(&booking.event_id)
            .ok_or_else(|| anyhow::anyhow!("booking {} has no event", booking.id))?;
        Ok(BookingDetails {
            booking: booking.clone(),
            user: user.summary(),
            event: EventSummary::from(event),
        })
    }

    fn bookings_newest_first(&self, owner: Option<Uuid>) -> Vec<&Booking> {
        let mut rows: Vec<_> = self
            .bookings
            .values()
            .filter(|b| owner.map_or(true, |o| b.user_id == o))
            .collect();
        rows.sort_by(|a, b| b.booking_date.cmp(&a.booking_date).then(a.id.cmp(&b.id)));
        rows
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(Some(user))
    }
}

#[async_trait]
impl EventRepo for MemoryStore {
    async fn create(&self, new: NewEvent) -> anyhow::Result<Event> {
        let now = OffsetDateTime::now_utc();
        let event = Event {
            id: Uuid::new_v4(),
            name: new.name,
            date: new.date,
            capacity: new.capacity,
            available_seats: new.capacity,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<EventDetails>> {
        let t = self.tables.lock().await;
        t.events.get(&id).map(|e| t.event_details(e)).transpose()
    }

    async fn list(
        &self,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<EventDetails>, i64)> {
        let t = self.tables.lock().await;
        let mut matching: Vec<_> = t.events.values().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        let total = matching.len() as i64;
        let rows = page(matching, limit, offset)
            .into_iter()
            .map(|e| t.event_details(e))
            .collect::<anyhow::Result<_>>()?;
        Ok((rows, total))
    }

    async fn update(&self, id: Uuid, changes: EventChanges) -> anyhow::Result<EventUpdate> {
        let mut t = self.tables.lock().await;
        let Some(current) = t.events.get(&id) else {
            return Ok(EventUpdate::NotFound);
        };
        let outcome = current.apply(&changes, OffsetDateTime::now_utc());
        if let EventUpdate::Updated(next) = &outcome {
            t.events.insert(id, next.clone());
        }
        Ok(outcome)
    }

    async fn delete_with_bookings(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().await;
        if t.events.remove(&id).is_none() {
            return Ok(false);
        }
        t.bookings.retain(|_, b| b.event_id != id);
        Ok(true)
    }
}

#[async_trait]
impl BookingRepo for MemoryStore {
    async fn reserve(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        tickets: i32,
        now: OffsetDateTime,
    ) -> anyhow::Result<Reservation> {
        let mut t = self.tables.lock().await;
        let already_booked = t
            .bookings
            .values()
            .any(|b| b.user_id == user_id && b.event_id == event_id);
        if let Err(rejection) =
            screen_reservation(t.events.get(&event_id), already_booked, tickets, now)
        {
            return Ok(Reservation::Rejected(rejection));
        }

        let Some(event) = t.events.get_mut(&event_id) else {
            anyhow::bail!("event {event_id} vanished while locked");
        };
        event.available_seats -= tickets;

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            number_of_tickets: tickets,
            booking_date: now,
            created_at: now,
        };
        t.bookings.insert(booking.id, booking.clone());
        Ok(Reservation::Confirmed(booking))
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<BookingDetails>> {
        let t = self.tables.lock().await;
        t.bookings.get(&id).map(|b| t.booking_details(b)).transpose()
    }

    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
        let mut t = self.tables.lock().await;
        let Some(booking) = t.bookings.remove(&id) else {
            return Ok(None);
        };
        if let Some(event) = t.events.get_mut(&booking.event_id) {
            event.available_seats += booking.number_of_tickets;
        }
        Ok(Some(booking))
    }

    async fn list(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<BookingDetails>, i64)> {
        let t = self.tables.lock().await;
        let rows = t.bookings_newest_first(owner);
        let total = rows.len() as i64;
        let rows = page(rows, limit, offset)
            .into_iter()
            .map(|b| t.booking_details(b))
            .collect::<anyhow::Result<_>>()?;
        Ok((rows, total))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<BookingDetails>> {
        let t = self.tables.lock().await;
        t.bookings_newest_first(None)
            .into_iter()
            .map(|b| t.booking_details(b))
            .collect()
    }
}
