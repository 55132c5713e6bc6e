use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use skyhold_core::catalog::{CatalogService, FlightSummary};
use skyhold_core::identity::IdentityService;
use skyhold_core::repository::BookingRepository;
use skyhold_core::{
    Booking, BookingStatus, CoreError, CoreResult, FlightId, NewBooking, NewBookingDetail,
    PassengerType, SeatClass, TripType, UserId,
};
use skyhold_shared::Masked;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{codes, passenger};

pub const DEFAULT_HOLD_MINUTES: i64 = 55;
pub const DEFAULT_CODE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerInput {
    pub title: String,
    pub full_name: String,
    pub dob: NaiveDate,
    pub nationality: String,
    #[serde(default)]
    pub passport_number: Option<Masked<String>>,
    #[serde(default)]
    pub issuing_country: Option<String>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

/// One cart line: a flight, the seat class to buy on it and who flies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub flight_id: FlightId,
    /// Matched case-insensitively against the flight's classes
    pub seat_class: String,
    pub passengers: Vec<PassengerInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketedPassenger {
    pub name: String,
    pub passenger_type: PassengerType,
    pub ticket_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentConfirmation {
    pub booking_code: String,
    pub flight_id: FlightId,
    pub flight_code: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seat_class: SeatClass,
    pub subtotal: Decimal,
    pub passengers: Vec<TicketedPassenger>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub trip_type: TripType,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub expires_at: DateTime<Utc>,
    pub segments: Vec<SegmentConfirmation>,
}

/// A validated cart line with its price snapshot
struct PricedItem {
    flight: FlightSummary,
    seat_class: SeatClass,
    unit_price: Decimal,
    passengers: Vec<(PassengerInput, PassengerType)>,
}

impl PricedItem {
    fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.passengers.len())
    }
}

/// Turns a cart into persisted pending bookings, one per item, all sharing
/// one order id and one payment deadline.
pub struct OrderAssembler {
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogService>,
    identity: Arc<dyn IdentityService>,
    hold: Duration,
    code_attempts: u32,
}

impl OrderAssembler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogService>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            bookings,
            catalog,
            identity,
            hold: Duration::minutes(DEFAULT_HOLD_MINUTES),
            code_attempts: DEFAULT_CODE_ATTEMPTS,
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_code_attempts(mut self, attempts: u32) -> Self {
        self.code_attempts = attempts.max(1);
        self
    }

    pub async fn create_order(&self, user_id: UserId, items: Vec<OrderItem>) -> CoreResult<OrderConfirmation> {
        self.create_order_at(user_id, items, Utc::now()).await
    }

    /// Same as `create_order` with an explicit clock
    pub async fn create_order_at(
        &self,
        user_id: UserId,
        items: Vec<OrderItem>,
        now: DateTime<Utc>,
    ) -> CoreResult<OrderConfirmation> {
        if items.is_empty() {
            return Err(CoreError::ValidationError("order must contain at least one item".to_string()));
        }

        if self.identity.user_by_id(user_id).await?.is_none() {
            return Err(CoreError::UserNotFound(user_id));
        }

        let today = now.date_naive();
        let mut priced = Vec::with_capacity(items.len());
        for item in items {
            priced.push(self.price_item(item, today).await?);
        }

        let trip_type = TripType::for_item_count(priced.len());
        let expires_at = now + self.hold;

        let mut attempt = 1;
        let (order_id, created) = loop {
            let order_id = codes::order_id(now);
            let drafts = draft_bookings(&order_id, user_id, trip_type, &priced, expires_at, now);

            match self.bookings.create_order(&drafts).await {
                Ok(created) => break (order_id, created),
                Err(CoreError::DuplicateCode) if attempt < self.code_attempts => {
                    warn!("Code collision on order {} (attempt {}), regenerating", order_id, attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let confirmation = confirm(order_id, trip_type, expires_at, &priced, created);
        info!(
            "Order {} created for user {}: {} segment(s), total {}",
            confirmation.order_id,
            user_id,
            confirmation.segments.len(),
            confirmation.total_amount
        );
        Ok(confirmation)
    }

    async fn price_item(&self, item: OrderItem, today: NaiveDate) -> CoreResult<PricedItem> {
        if item.passengers.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "flight {} has no passengers",
                item.flight_id
            )));
        }

        let seat_class: SeatClass = item.seat_class.parse()?;
        let flight = self
            .catalog
            .flight_by_id(item.flight_id)
            .await?
            .ok_or(CoreError::FlightNotFound(item.flight_id))?;

        let unit_price = flight
            .class(seat_class)
            .map(|c| c.price)
            .ok_or(CoreError::SeatClassUnavailable {
                flight_id: item.flight_id,
                seat_class,
            })?;

        let passengers = item
            .passengers
            .into_iter()
            .map(|p| {
                let kind = passenger::classify(p.dob, today);
                (p, kind)
            })
            .collect();

        Ok(PricedItem {
            flight,
            seat_class,
            unit_price,
            passengers,
        })
    }
}

/// Fresh codes on every call, so a retry after `DuplicateCode` starts clean
fn draft_bookings(
    order_id: &str,
    user_id: UserId,
    trip_type: TripType,
    priced: &[PricedItem],
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<NewBooking> {
    priced
        .iter()
        .map(|item| {
            let booking_code = codes::booking_code();
            let tickets = codes::ticket_numbers(&booking_code, item.passengers.len());

            let passengers = item
                .passengers
                .iter()
                .zip(tickets)
                .map(|((p, kind), ticket_number)| NewBookingDetail {
                    passenger_title: p.title.clone(),
                    passenger_name: p.full_name.clone(),
                    passenger_dob: p.dob,
                    passenger_type: *kind,
                    nationality: p.nationality.clone(),
                    passport_number: p.passport_number.clone(),
                    issuing_country: p.issuing_country.clone(),
                    valid_until: p.valid_until,
                    ticket_number,
                    price: item.unit_price,
                })
                .collect();

            NewBooking {
                order_id: order_id.to_string(),
                user_id,
                flight_id: item.flight.id,
                booking_code,
                trip_type,
                seat_class: item.seat_class,
                total_price: item.subtotal(),
                expires_at,
                created_at: now,
                passengers,
            }
        })
        .collect()
}

fn confirm(
    order_id: String,
    trip_type: TripType,
    expires_at: DateTime<Utc>,
    priced: &[PricedItem],
    created: Vec<Booking>,
) -> OrderConfirmation {
    let segments: Vec<SegmentConfirmation> = priced
        .iter()
        .zip(created)
        .map(|(item, booking)| SegmentConfirmation {
            booking_code: booking.booking_code,
            flight_id: item.flight.id,
            flight_code: item.flight.flight_code.clone(),
            origin: item.flight.origin.clone(),
            destination: item.flight.destination.clone(),
            departure_time: item.flight.departure_time,
            seat_class: item.seat_class,
            subtotal: booking.total_price,
            passengers: booking
                .details
                .into_iter()
                .map(|d| TicketedPassenger {
                    name: d.passenger_name,
                    passenger_type: d.passenger_type,
                    ticket_number: d.ticket_number,
                })
                .collect(),
        })
        .collect();

    OrderConfirmation {
        order_id,
        trip_type,
        status: BookingStatus::Pending,
        total_amount: segments.iter().map(|s| s.subtotal).sum(),
        expires_at,
        segments,
    }
}
