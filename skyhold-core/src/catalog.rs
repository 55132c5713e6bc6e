use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::{FlightId, SeatClass};
use crate::CoreResult;

/// Price and remaining seats of one seat class on one flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightClass {
    pub flight_id: FlightId,
    pub seat_class: SeatClass,
    pub price: Decimal,
    pub total_seats: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSummary {
    pub id: FlightId,
    pub flight_code: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub classes: Vec<FlightClass>,
}

impl FlightSummary {
    pub fn class(&self, seat_class: SeatClass) -> Option<&FlightClass> {
        self.classes.iter().find(|c| c.seat_class == seat_class)
    }
}

/// Read-only access to the flight catalog, owned by another module
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn flight_by_id(&self, id: FlightId) -> CoreResult<Option<FlightSummary>>;
}
