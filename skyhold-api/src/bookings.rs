use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use skyhold_core::catalog::{CatalogService, FlightSummary};
use skyhold_core::{Booking, BookingStatus, CoreResult, FlightId, PassengerType, SeatClass, TripType};
use std::collections::HashMap;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FlightView {
    pub flight_code: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PassengerView {
    pub title: String,
    pub name: String,
    pub passenger_type: PassengerType,
    pub ticket_number: String,
    pub seat_class: SeatClass,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub booking_code: String,
    pub order_id: String,
    pub status: BookingStatus,
    pub trip_type: TripType,
    pub total_price: Decimal,
    /// Payment deadline; only shown while the booking is still pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub flight: Option<FlightView>,
    pub passengers: Vec<PassengerView>,
}

impl BookingView {
    fn new(booking: Booking, flight: Option<&FlightSummary>) -> Self {
        Self {
            expires_at: (booking.status == BookingStatus::Pending).then_some(booking.expires_at),
            booking_code: booking.booking_code,
            order_id: booking.order_id,
            status: booking.status,
            trip_type: booking.trip_type,
            total_price: booking.total_price,
            created_at: booking.created_at,
            flight: flight.map(|f| FlightView {
                flight_code: f.flight_code.clone(),
                origin: f.origin.clone(),
                destination: f.destination.clone(),
                departure_time: f.departure_time,
                arrival_time: f.arrival_time,
            }),
            passengers: booking
                .details
                .into_iter()
                .map(|d| PassengerView {
                    title: d.passenger_title,
                    name: d.passenger_name,
                    passenger_type: d.passenger_type,
                    ticket_number: d.ticket_number,
                    seat_class: d.seat_class,
                    price: d.price,
                })
                .collect(),
        }
    }
}

/// Attach flight summaries, fetching each distinct flight once
pub async fn with_flights(catalog: &dyn CatalogService, bookings: Vec<Booking>) -> CoreResult<Vec<BookingView>> {
    let mut flights: HashMap<FlightId, Option<FlightSummary>> = HashMap::new();
    for booking in &bookings {
        if !flights.contains_key(&booking.flight_id) {
            let flight = catalog.flight_by_id(booking.flight_id).await?;
            flights.insert(booking.flight_id, flight);
        }
    }

    Ok(bookings
        .into_iter()
        .map(|b| {
            let flight = flights.get(&b.flight_id).and_then(|f| f.as_ref());
            BookingView::new(b, flight)
        })
        .collect())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/bookings
/// Booking history of the caller, newest first
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let user_id = claims.user_id()?;
    let bookings = state.bookings.find_by_user_id(user_id).await?;
    let views = with_flights(state.catalog.as_ref(), bookings).await?;
    Ok(Json(views))
}
