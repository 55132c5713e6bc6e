use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use skyhold_core::catalog::{CatalogService, FlightClass, FlightSummary};
use skyhold_core::{CoreResult, FlightId};
use sqlx::PgPool;

use crate::database::storage_error;

/// Read side of the flight catalog. Flight maintenance lives outside the
/// booking core; only lookups are needed here.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    flight_code: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FlightClassRow {
    flight_id: i64,
    seat_class: String,
    price: Decimal,
    total_seats: i32,
}

#[async_trait]
impl CatalogService for PgCatalog {
    async fn flight_by_id(&self, id: FlightId) -> CoreResult<Option<FlightSummary>> {
        let flight: Option<FlightRow> = sqlx::query_as(
            "SELECT id, flight_code, origin, destination, departure_time, arrival_time FROM flights WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(flight) = flight else {
            return Ok(None);
        };

        let class_rows: Vec<FlightClassRow> = sqlx::query_as(
            "SELECT flight_id, seat_class, price, total_seats FROM flight_classes WHERE flight_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut classes = Vec::with_capacity(class_rows.len());
        for row in class_rows {
            classes.push(FlightClass {
                flight_id: row.flight_id,
                seat_class: row.seat_class.parse()?,
                price: row.price,
                total_seats: row.total_seats,
            });
        }

        Ok(Some(FlightSummary {
            id: flight.id,
            flight_code: flight.flight_code,
            origin: flight.origin,
            destination: flight.destination,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            classes,
        }))
    }
}
