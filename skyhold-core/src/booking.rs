use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use skyhold_shared::Masked;
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

pub type FlightId = i64;
pub type UserId = i64;
pub type BookingId = i64;

/// Fare category with its own price and seat pool on every flight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeatClass {
    Economy,
    Business,
    FirstClass,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Economy => "economy",
            SeatClass::Business => "business",
            SeatClass::FirstClass => "first_class",
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [SeatClass::Economy, SeatClass::Business, SeatClass::FirstClass]
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::ValidationError(format!("unknown seat class '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Failed,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Failed => "failed",
            BookingStatus::Expired => "expired",
        }
    }

    /// Forward edges of the lifecycle. Self-loops are handled by `guard_transition`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Paid)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Pending, BookingStatus::Failed)
                | (BookingStatus::Paid, BookingStatus::Expired)
        )
    }

    /// Whether moving from `self` to `next` hands the booking's seats back:
    /// a pending booking that ends without payment.
    pub fn releases_seats(&self, next: BookingStatus) -> bool {
        *self == BookingStatus::Pending
            && matches!(next, BookingStatus::Cancelled | BookingStatus::Failed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "paid" => Ok(BookingStatus::Paid),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "failed" => Ok(BookingStatus::Failed),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(CoreError::InternalError(format!("unknown booking status '{}'", other))),
        }
    }
}

/// Decide whether moving a booking of `order_id` from `current` to `next` is
/// allowed. `Ok(true)` means a write is needed, `Ok(false)` means the booking
/// is already there (redelivered webhook).
///
/// A cancelled booking refuses every target with `AlreadyCancelled`, which is
/// how reconciliation learns that the expiry sweep won the race.
pub fn guard_transition(order_id: &str, current: BookingStatus, next: BookingStatus) -> CoreResult<bool> {
    if current == BookingStatus::Cancelled {
        return Err(CoreError::AlreadyCancelled(order_id.to_string()));
    }
    if current == next {
        return Ok(false);
    }
    if !current.can_transition_to(next) {
        return Err(CoreError::InvalidTransition { from: current, to: next });
    }
    Ok(true)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl TripType {
    /// One item is a one-way trip, anything more is treated as a round trip.
    /// No return-leg validation happens here.
    pub fn for_item_count(count: usize) -> Self {
        if count > 1 {
            TripType::RoundTrip
        } else {
            TripType::OneWay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "one_way",
            TripType::RoundTrip => "round_trip",
        }
    }
}

impl FromStr for TripType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_way" => Ok(TripType::OneWay),
            "round_trip" => Ok(TripType::RoundTrip),
            other => Err(CoreError::InternalError(format!("unknown trip type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerType::Adult => "adult",
            PassengerType::Child => "child",
            PassengerType::Infant => "infant",
        }
    }
}

impl FromStr for PassengerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adult" => Ok(PassengerType::Adult),
            "child" => Ok(PassengerType::Child),
            "infant" => Ok(PassengerType::Infant),
            other => Err(CoreError::InternalError(format!("unknown passenger type '{}'", other))),
        }
    }
}

/// One flight purchase unit. Several bookings share an `order_id` on a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub order_id: String,
    pub user_id: UserId,
    pub flight_id: FlightId,
    pub booking_code: String,
    pub trip_type: TripType,
    pub total_passengers: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: Vec<BookingDetail>,
}

impl Booking {
    /// Seats held against inventory by this booking.
    pub fn reserved_seats(&self) -> i32 {
        self.details.len() as i32
    }
}

/// Passenger manifest entry. `price` is the class price at purchase time and
/// never follows later catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetail {
    pub id: i64,
    pub booking_id: BookingId,
    pub passenger_title: String,
    pub passenger_name: String,
    pub passenger_dob: NaiveDate,
    pub passenger_type: PassengerType,
    pub nationality: String,
    pub passport_number: Option<Masked<String>>,
    pub issuing_country: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub ticket_number: String,
    pub seat_class: SeatClass,
    pub price: Decimal,
}

/// A booking ready to be persisted together with its inventory reservation.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub order_id: String,
    pub user_id: UserId,
    pub flight_id: FlightId,
    pub booking_code: String,
    pub trip_type: TripType,
    pub seat_class: SeatClass,
    pub total_price: Decimal,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub passengers: Vec<NewBookingDetail>,
}

impl NewBooking {
    pub fn seat_count(&self) -> i32 {
        self.passengers.len() as i32
    }
}

#[derive(Debug, Clone)]
pub struct NewBookingDetail {
    pub passenger_title: String,
    pub passenger_name: String,
    pub passenger_dob: NaiveDate,
    pub passenger_type: PassengerType,
    pub nationality: String,
    pub passport_number: Option<Masked<String>>,
    pub issuing_country: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub ticket_number: String,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_class_parsing_is_case_insensitive() {
        assert_eq!("Economy".parse::<SeatClass>().unwrap(), SeatClass::Economy);
        assert_eq!("FIRST_CLASS".parse::<SeatClass>().unwrap(), SeatClass::FirstClass);
        assert!("premium".parse::<SeatClass>().is_err());
    }

    #[test]
    fn test_lifecycle_edges() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Paid));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Failed));
        assert!(BookingStatus::Paid.can_transition_to(BookingStatus::Expired));
        assert!(!BookingStatus::Paid.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Expired));
        assert!(!BookingStatus::Failed.can_transition_to(BookingStatus::Paid));
    }

    #[test]
    fn test_only_unpaid_exits_release_seats() {
        assert!(BookingStatus::Pending.releases_seats(BookingStatus::Cancelled));
        assert!(BookingStatus::Pending.releases_seats(BookingStatus::Failed));
        assert!(!BookingStatus::Pending.releases_seats(BookingStatus::Paid));
        assert!(!BookingStatus::Paid.releases_seats(BookingStatus::Expired));
        assert!(!BookingStatus::Failed.releases_seats(BookingStatus::Failed));
    }

    #[test]
    fn test_cancelled_refuses_every_target() {
        for target in [
            BookingStatus::Pending,
            BookingStatus::Paid,
            BookingStatus::Cancelled,
            BookingStatus::Failed,
            BookingStatus::Expired,
        ] {
            let result = guard_transition("ORD-1", BookingStatus::Cancelled, target);
            assert!(matches!(result, Err(CoreError::AlreadyCancelled(ref id)) if id == "ORD-1"));
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        assert!(!guard_transition("ORD-1", BookingStatus::Paid, BookingStatus::Paid).unwrap());
        assert!(guard_transition("ORD-1", BookingStatus::Pending, BookingStatus::Paid).unwrap());
        assert!(matches!(
            guard_transition("ORD-1", BookingStatus::Paid, BookingStatus::Pending),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_trip_type_heuristic() {
        assert_eq!(TripType::for_item_count(1), TripType::OneWay);
        assert_eq!(TripType::for_item_count(2), TripType::RoundTrip);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&BookingStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert_eq!("expired".parse::<BookingStatus>().unwrap(), BookingStatus::Expired);
    }
}
