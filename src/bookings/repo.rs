use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::bookings::repo_types::{
    screen_reservation, Booking, BookingDetails, BookingDetailsRow, Rejection, Reservation,
};
use crate::db::{is_unique_violation, PgStore};
use crate::events::repo_types::Event;

#[async_trait]
pub trait BookingRepo: Send + Sync {
    /// Screens and, if accepted, records the booking and takes its seats from
    /// the event in one atomic step.
    async fn reserve(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        tickets: i32,
        now: OffsetDateTime,
    ) -> anyhow::Result<Reservation>;

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>>;

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<BookingDetails>>;

    /// Deletes the booking and returns its seats to the event in one atomic step.
    /// Returns `None` if the booking was already gone.
    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Booking>>;

    /// One page ordered by booking date, newest first. `owner` restricts to one user.
    async fn list(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<BookingDetails>, i64)>;

    /// Every booking, newest first.
    async fn list_all(&self) -> anyhow::Result<Vec<BookingDetails>>;
}

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.event_id, b.number_of_tickets, b.booking_date, b.created_at,
           u.name AS user_name, u.email AS user_email,
           e.name AS event_name, e.date AS event_date, e.capacity AS event_capacity
    FROM bookings b
    JOIN users u ON u.id = b.user_id
    JOIN events e ON e.id = b.event_id
"#;

#[async_trait]
impl BookingRepo for PgStore {
    async fn reserve(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        tickets: i32,
        now: OffsetDateTime,
    ) -> anyhow::Result<Reservation> {
        let mut tx = self.pool.begin().await.context("begin reserve tx")?;

        // Every seat mutation locks the event row first.
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, date, capacity, available_seats, created_by, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await
        .context("lock event")?;

        let already_booked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE user_id = $1 AND event_id = $2)",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await
        .context("check existing booking")?;

        if let Err(rejection) = screen_reservation(event.as_ref(), already_booked, tickets, now) {
            return Ok(Reservation::Rejected(rejection));
        }

        sqlx::query("UPDATE events SET available_seats = available_seats - $2 WHERE id = $1")
            .bind(event_id)
            .bind(tickets)
            .execute(&mut *tx)
            .await
            .context("take seats")?;

        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, user_id, event_id, number_of_tickets, booking_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, event_id, number_of_tickets, booking_date, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_id)
        .bind(tickets)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let booking = match inserted {
            Ok(b) => b,
            Err(e) if is_unique_violation(&e) => {
                return Ok(Reservation::Rejected(Rejection::AlreadyBooked));
            }
            Err(e) => return Err(e).context("insert booking"),
        };

        tx.commit().await.context("commit reserve tx")?;
        Ok(Reservation::Confirmed(booking))
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, user_id, event_id, number_of_tickets, booking_date, created_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find booking")?;
        Ok(booking)
    }

    async fn find_details(&self, id: Uuid) -> anyhow::Result<Option<BookingDetails>> {
        let row =
            sqlx::query_as::<_, BookingDetailsRow>(&format!("{DETAILS_SELECT} WHERE b.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("find booking details")?;
        Ok(row.map(Into::into))
    }

    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Booking>> {
        let mut tx = self.pool.begin().await.context("begin release tx")?;

        let Some(event_id) =
            sqlx::query_scalar::<_, Uuid>("SELECT event_id FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("find booking event")?
        else {
            return Ok(None);
        };

        sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("lock event")?;

        let Some(booking) = sqlx::query_as::<_, Booking>(
            r#"
            DELETE FROM bookings
            WHERE id = $1
            RETURNING id, user_id, event_id, number_of_tickets, booking_date, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("delete booking")?
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE events SET available_seats = available_seats + $2 WHERE id = $1")
            .bind(booking.event_id)
            .bind(booking.number_of_tickets)
            .execute(&mut *tx)
            .await
            .context("return seats")?;

        tx.commit().await.context("commit release tx")?;
        Ok(Some(booking))
    }

    async fn list(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<BookingDetails>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings WHERE ($1::uuid IS NULL OR user_id = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .context("count bookings")?;

        let rows = sqlx::query_as::<_, BookingDetailsRow>(&format!(
            "{DETAILS_SELECT}
            WHERE ($1::uuid IS NULL OR b.user_id = $1)
            ORDER BY b.booking_date DESC, b.id
            LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("list bookings")?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<BookingDetails>> {
        let rows = sqlx::query_as::<_, BookingDetailsRow>(&format!(
            "{DETAILS_SELECT} ORDER BY b.booking_date DESC, b.id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list all bookings")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
