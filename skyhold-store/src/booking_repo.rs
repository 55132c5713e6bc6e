use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use skyhold_core::booking::guard_transition;
use skyhold_core::repository::BookingRepository;
use skyhold_core::{
    Booking, BookingDetail, BookingStatus, CoreError, CoreResult, NewBooking, PaymentStatus, UserId,
};
use skyhold_shared::Masked;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;

use crate::database::storage_error;
use crate::inventory::{release_booking_seats, reserve_seats};

const BOOKING_COLUMNS: &str = "id, order_id, user_id, flight_id, booking_code, trip_type, \
    total_passengers, total_price, status, expires_at, created_at, updated_at";

const DETAIL_COLUMNS: &str = "id, booking_id, passenger_title, passenger_name, passenger_dob, \
    passenger_type, nationality, passport_number, issuing_country, valid_until, ticket_number, \
    seat_class, price";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_details(&self, rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let detail_rows: Vec<DetailRow> = sqlx::query_as(&format!(
            "SELECT {} FROM booking_details WHERE booking_id = ANY($1) ORDER BY id",
            DETAIL_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut grouped: HashMap<i64, Vec<BookingDetail>> = HashMap::new();
        for row in detail_rows {
            let detail = BookingDetail::try_from(row)?;
            grouped.entry(detail.booking_id).or_default().push(detail);
        }

        rows.into_iter()
            .map(|row| {
                let details = grouped.remove(&row.id).unwrap_or_default();
                row.into_booking(details)
            })
            .collect()
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    order_id: String,
    user_id: i64,
    flight_id: i64,
    booking_code: String,
    trip_type: String,
    total_passengers: i32,
    total_price: Decimal,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, details: Vec<BookingDetail>) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            flight_id: self.flight_id,
            booking_code: self.booking_code,
            trip_type: self.trip_type.parse()?,
            total_passengers: self.total_passengers,
            total_price: self.total_price,
            status: self.status.parse()?,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            details,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    id: i64,
    booking_id: i64,
    passenger_title: String,
    passenger_name: String,
    passenger_dob: NaiveDate,
    passenger_type: String,
    nationality: String,
    passport_number: Option<String>,
    issuing_country: Option<String>,
    valid_until: Option<NaiveDate>,
    ticket_number: String,
    seat_class: String,
    price: Decimal,
}

impl TryFrom<DetailRow> for BookingDetail {
    type Error = CoreError;

    fn try_from(row: DetailRow) -> Result<Self, Self::Error> {
        Ok(BookingDetail {
            id: row.id,
            booking_id: row.booking_id,
            passenger_title: row.passenger_title,
            passenger_name: row.passenger_name,
            passenger_dob: row.passenger_dob,
            passenger_type: row.passenger_type.parse()?,
            nationality: row.nationality,
            passport_number: row.passport_number.map(Masked),
            issuing_country: row.issuing_country,
            valid_until: row.valid_until,
            ticket_number: row.ticket_number,
            seat_class: row.seat_class.parse()?,
            price: row.price,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_order(&self, bookings: &[NewBooking]) -> CoreResult<Vec<Booking>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let mut created = Vec::with_capacity(bookings.len());

        // Order ids are not unique per row (one row per segment), so a
        // collision is detected under a per-id lock instead of a constraint.
        if let Some(first) = bookings.first() {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(&first.order_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;

            let (taken,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bookings WHERE order_id = $1)")
                    .bind(&first.order_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(storage_error)?;
            if taken {
                debug!("Order id {} already in use", first.order_id);
                return Err(CoreError::DuplicateCode);
            }
        }

        for booking in bookings {
            if booking.passengers.is_empty() {
                return Err(CoreError::ValidationError(
                    "booking details/passengers cannot be empty".to_string(),
                ));
            }

            reserve_seats(&mut tx, booking.flight_id, booking.seat_class, booking.seat_count()).await?;

            let row: BookingRow = sqlx::query_as(&format!(
                r#"
                INSERT INTO bookings (order_id, user_id, flight_id, booking_code, trip_type, total_passengers, total_price, status, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                RETURNING {}
                "#,
                BOOKING_COLUMNS
            ))
            .bind(&booking.order_id)
            .bind(booking.user_id)
            .bind(booking.flight_id)
            .bind(&booking.booking_code)
            .bind(booking.trip_type.as_str())
            .bind(booking.seat_count())
            .bind(booking.total_price)
            .bind(BookingStatus::Pending.as_str())
            .bind(booking.expires_at)
            .bind(booking.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

            let mut details = Vec::with_capacity(booking.passengers.len());
            for passenger in &booking.passengers {
                let detail: DetailRow = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO booking_details (booking_id, passenger_title, passenger_name, passenger_dob, passenger_type, nationality, passport_number, issuing_country, valid_until, ticket_number, seat_class, price)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    RETURNING {}
                    "#,
                    DETAIL_COLUMNS
                ))
                .bind(row.id)
                .bind(&passenger.passenger_title)
                .bind(&passenger.passenger_name)
                .bind(passenger.passenger_dob)
                .bind(passenger.passenger_type.as_str())
                .bind(&passenger.nationality)
                .bind(passenger.passport_number.as_ref().map(|p| p.expose().as_str()))
                .bind(passenger.issuing_country.as_deref())
                .bind(passenger.valid_until)
                .bind(&passenger.ticket_number)
                .bind(booking.seat_class.as_str())
                .bind(passenger.price)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_error)?;

                details.push(BookingDetail::try_from(detail)?);
            }

            created.push(row.into_booking(details)?);
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(created)
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE order_id = $1 ORDER BY id",
            BOOKING_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        self.with_details(rows).await
    }

    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC, id",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        self.with_details(rows).await
    }

    async fn update_status(&self, order_id: &str, status: BookingStatus) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // Lock the order's rows so the sweep cannot cancel between check and set
        let current: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, flight_id, status FROM bookings WHERE order_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        if current.is_empty() {
            return Err(CoreError::OrderNotFound(order_id.to_string()));
        }

        let mut needs_write = false;
        let mut freed = Vec::new();
        for (id, flight_id, raw) in &current {
            let from: BookingStatus = raw.parse()?;
            needs_write |= guard_transition(order_id, from, status)?;
            if from.releases_seats(status) {
                freed.push((*id, *flight_id));
            }
        }

        if needs_write {
            sqlx::query(
                "UPDATE bookings SET status = $1, updated_at = NOW() WHERE order_id = $2 AND status <> $1",
            )
            .bind(status.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        for (booking_id, flight_id) in freed {
            release_booking_seats(&mut tx, booking_id, flight_id).await?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE status = $1 AND expires_at < $2 ORDER BY expires_at, id",
            BOOKING_COLUMNS
        ))
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        self.with_details(rows).await
    }

    async fn cancel_and_release(&self, booking: &Booking) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // Claim: only a still-pending booking is cancelled, so a second sweep
        // (or another instance) cannot release the same seats again.
        let claimed = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(BookingStatus::Cancelled.as_str())
        .bind(booking.id)
        .bind(BookingStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(storage_error)?;
            debug!("Booking {} no longer pending, nothing to release", booking.id);
            return Ok(false);
        }

        sqlx::query(
            "UPDATE payments SET payment_status = $1, updated_at = NOW() WHERE order_id = $2 AND payment_status = $3",
        )
        .bind(PaymentStatus::Expired.as_str())
        .bind(&booking.order_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        release_booking_seats(&mut tx, booking.id, booking.flight_id).await?;

        tx.commit().await.map_err(storage_error)?;
        Ok(true)
    }

    async fn archive_departed(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bookings b
            SET status = $1, updated_at = NOW()
            FROM flights f
            WHERE b.flight_id = f.id AND b.status = $2 AND f.arrival_time < $3
            "#,
        )
        .bind(BookingStatus::Expired.as_str())
        .bind(BookingStatus::Paid.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected())
    }
}
