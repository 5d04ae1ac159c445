use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::PgStore;
use crate::events::repo_types::{
    Event, EventChanges, EventDetails, EventDetailsRow, EventFilter, EventUpdate, NewEvent,
};

#[async_trait]
pub trait EventRepo: Send + Sync {
    /// Inserts the event with every seat available.
    async fn create(&self, new: NewEvent) -> anyhow::Result<Event>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Event>>;

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<EventDetails>>;

    /// One page of events ordered by date, plus the total matching `filter`.
    async fn list(
        &self,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<EventDetails>, i64)>;

    /// Applies `changes` while holding the event, see [`Event::apply`].
    async fn update(&self, id: Uuid, changes: EventChanges) -> anyhow::Result<EventUpdate>;

    /// Deletes every booking of the event and then the event itself, as one unit.
    /// Returns `false` if the event did not exist.
    async fn delete_with_bookings(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
impl EventRepo for PgStore {
    async fn create(&self, new: NewEvent) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, name, date, capacity, available_seats, created_by)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING id, name, date, capacity, available_seats, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.date)
        .bind(new.capacity)
        .bind(new.created_by)
        .fetch_one(&self.pool)
        .await
        .context("insert event")?;
        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, date, capacity, available_seats, created_by, created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find event")?;
        Ok(event)
    }

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<EventDetails>> {
        let row = sqlx::query_as::<_, EventDetailsRow>(
            r#"
            SELECT e.id, e.name, e.date, e.capacity, e.available_seats, e.created_by,
                   e.created_at, e.updated_at,
                   u.name AS creator_name, u.email AS creator_email
            FROM events e
            JOIN users u ON u.id = e.created_by
            WHERE e.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find event details")?;
        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<EventDetails>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM events
            WHERE ($1::timestamptz IS NULL OR date >= $1)
              AND ($2::timestamptz IS NULL OR date <= $2)
            "#,
        )
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&self.pool)
        .await
        .context("count events")?;

        let rows = sqlx::query_as::<_, EventDetailsRow>(
            r#"
            SELECT e.id, e.name, e.date, e.capacity, e.available_seats, e.created_by,
                   e.created_at, e.updated_at,
                   u.name AS creator_name, u.email AS creator_email
            FROM events e
            JOIN users u ON u.id = e.created_by
            WHERE ($1::timestamptz IS NULL OR e.date >= $1)
              AND ($2::timestamptz IS NULL OR e.date <= $2)
            ORDER BY e.date ASC, e.id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.start)
        .bind(filter.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list events")?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn update(&self, id: Uuid, changes: EventChanges) -> anyhow::Result<EventUpdate> {
        let mut tx = self.pool.begin().await.context("begin update tx")?;

        // Row lock serializes against bookings and cancellations of this event.
        let current = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, date, capacity, available_seats, created_by, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("lock event")?;

        let Some(current) = current else {
            return Ok(EventUpdate::NotFound);
        };

        let next = match current.apply(&changes, OffsetDateTime::now_utc()) {
            EventUpdate::Updated(next) => next,
            refused => return Ok(refused),
        };

        let saved = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET name = $2, date = $3, capacity = $4, available_seats = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, name, date, capacity, available_seats, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&next.name)
        .bind(next.date)
        .bind(next.capacity)
        .bind(next.available_seats)
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await
        .context("update event")?;

        tx.commit().await.context("commit update tx")?;
        Ok(EventUpdate::Updated(saved))
    }

    async fn delete_with_bookings(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await.context("begin delete tx")?;

        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock event")?;
        if locked.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM bookings WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete event bookings")?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete event")?;

        tx.commit().await.context("commit delete tx")?;
        Ok(true)
    }
}
