//! In-process store backing every repository trait with plain collections
//! behind one async mutex. Each trait call holds the lock for its whole body,
//! which gives the same atomicity the Postgres transactions give.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_core::booking::guard_transition;
use skyhold_core::catalog::{CatalogService, FlightSummary};
use skyhold_core::identity::{IdentityService, UserProfile};
use skyhold_core::payment::{NewPayment, Payment};
use skyhold_core::repository::{ensure_seat_count, BookingRepository, InventoryLedger, PaymentRepository};
use skyhold_core::{
    Booking, BookingDetail, BookingStatus, CoreError, CoreResult, FlightId, NewBooking,
    PaymentStatus, SeatClass, UserId,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserProfile>,
    flights: HashMap<FlightId, FlightSummary>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    next_booking_id: i64,
    next_detail_id: i64,
    next_payment_id: i64,
}

impl Tables {
    fn seats_mut(&mut self, flight_id: FlightId, seat_class: SeatClass) -> Option<&mut i32> {
        self.flights
            .get_mut(&flight_id)
            .and_then(|f| f.classes.iter_mut().find(|c| c.seat_class == seat_class))
            .map(|c| &mut c.total_seats)
    }

    fn seats(&self, flight_id: FlightId, seat_class: SeatClass) -> Option<i32> {
        self.flights
            .get(&flight_id)
            .and_then(|f| f.class(seat_class))
            .map(|c| c.total_seats)
    }

    fn order_taken(&self, order_id: &str) -> bool {
        self.bookings.iter().any(|b| b.order_id == order_id)
    }

    fn code_taken(&self, booking_code: &str) -> bool {
        self.bookings.iter().any(|b| b.booking_code == booking_code)
    }

    fn ticket_taken(&self, ticket_number: &str) -> bool {
        self.bookings
            .iter()
            .flat_map(|b| b.details.iter())
            .any(|d| d.ticket_number == ticket_number)
    }

    fn give_back(&mut self, flight_id: FlightId, reserved: HashMap<SeatClass, i32>) {
        for (seat_class, count) in reserved {
            if let Some(seats) = self.seats_mut(flight_id, seat_class) {
                *seats += count;
            }
        }
    }
}

/// Seats a stored booking holds, per class, counted from its details
fn reserved_by(booking: &Booking) -> HashMap<SeatClass, i32> {
    let mut reserved: HashMap<SeatClass, i32> = HashMap::new();
    for detail in &booking.details {
        *reserved.entry(detail.seat_class).or_default() += 1;
    }
    reserved
}


#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user the identity lookup will find
    pub async fn add_user(&self, user: UserProfile) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Seed a flight; its class `total_seats` become the live seat counters
    pub async fn add_flight(&self, flight: FlightSummary) {
        self.tables.lock().await.flights.insert(flight.id, flight);
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn reserve(&self, flight_id: FlightId, seat_class: SeatClass, count: i32) -> CoreResult<()> {
        ensure_seat_count(count)?;
        let mut tables = self.tables.lock().await;
        match tables.seats_mut(flight_id, seat_class) {
            Some(seats) if *seats >= count => {
                *seats -= count;
                Ok(())
            }
            _ => Err(CoreError::InsufficientInventory {
                flight_id,
                seat_class,
                requested: count,
            }),
        }
    }

    async fn release(&self, flight_id: FlightId, seat_class: SeatClass, count: i32) -> CoreResult<()> {
        ensure_seat_count(count)?;
        let mut tables = self.tables.lock().await;
        if let Some(seats) = tables.seats_mut(flight_id, seat_class) {
            *seats += count;
        }
        Ok(())
    }

    async fn remaining(&self, flight_id: FlightId, seat_class: SeatClass) -> CoreResult<Option<i32>> {
        Ok(self.tables.lock().await.seats(flight_id, seat_class))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_order(&self, bookings: &[NewBooking]) -> CoreResult<Vec<Booking>> {
        let mut tables = self.tables.lock().await;

        // Validate the whole batch before touching anything
        if bookings.iter().any(|b| tables.order_taken(&b.order_id)) {
            return Err(CoreError::DuplicateCode);
        }
        let mut needed: HashMap<(FlightId, SeatClass), i32> = HashMap::new();
        let mut codes = HashSet::new();
        let mut tickets = HashSet::new();
        for booking in bookings {
            if booking.passengers.is_empty() {
                return Err(CoreError::ValidationError(
                    "booking details/passengers cannot be empty".to_string(),
                ));
            }
            *needed.entry((booking.flight_id, booking.seat_class)).or_default() += booking.seat_count();

            if tables.code_taken(&booking.booking_code) || !codes.insert(booking.booking_code.as_str()) {
                return Err(CoreError::DuplicateCode);
            }
            for passenger in &booking.passengers {
                if tables.ticket_taken(&passenger.ticket_number)
                    || !tickets.insert(passenger.ticket_number.as_str())
                {
                    return Err(CoreError::DuplicateCode);
                }
            }
        }

        for booking in bookings {
            let wanted = needed[&(booking.flight_id, booking.seat_class)];
            let available = tables.seats(booking.flight_id, booking.seat_class).unwrap_or(0);
            if available < wanted {
                return Err(CoreError::InsufficientInventory {
                    flight_id: booking.flight_id,
                    seat_class: booking.seat_class,
                    requested: booking.seat_count(),
                });
            }
        }

        let mut created = Vec::with_capacity(bookings.len());
        for booking in bookings {
            if let Some(seats) = tables.seats_mut(booking.flight_id, booking.seat_class) {
                *seats -= booking.seat_count();
            }

            tables.next_booking_id += 1;
            let booking_id = tables.next_booking_id;

            let mut details = Vec::with_capacity(booking.passengers.len());
            for passenger in &booking.passengers {
                tables.next_detail_id += 1;
                details.push(BookingDetail {
                    id: tables.next_detail_id,
                    booking_id,
                    passenger_title: passenger.passenger_title.clone(),
                    passenger_name: passenger.passenger_name.clone(),
                    passenger_dob: passenger.passenger_dob,
                    passenger_type: passenger.passenger_type,
                    nationality: passenger.nationality.clone(),
                    passport_number: passenger.passport_number.clone(),
                    issuing_country: passenger.issuing_country.clone(),
                    valid_until: passenger.valid_until,
                    ticket_number: passenger.ticket_number.clone(),
                    seat_class: booking.seat_class,
                    price: passenger.price,
                });
            }

            let stored = Booking {
                id: booking_id,
                order_id: booking.order_id.clone(),
                user_id: booking.user_id,
                flight_id: booking.flight_id,
                booking_code: booking.booking_code.clone(),
                trip_type: booking.trip_type,
                total_passengers: booking.seat_count(),
                total_price: booking.total_price,
                status: BookingStatus::Pending,
                expires_at: booking.expires_at,
                created_at: booking.created_at,
                updated_at: booking.created_at,
                details,
            };
            tables.bookings.push(stored.clone());
            created.push(stored);
        }

        Ok(created)
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_status(&self, order_id: &str, status: BookingStatus) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;

        let mut found = false;
        for booking in tables.bookings.iter().filter(|b| b.order_id == order_id) {
            found = true;
            guard_transition(order_id, booking.status, status)?;
        }
        if !found {
            return Err(CoreError::OrderNotFound(order_id.to_string()));
        }

        // Leaving pending without payment gives the seats back in the same step
        let now = Utc::now();
        let mut freed: Vec<(FlightId, HashMap<SeatClass, i32>)> = Vec::new();
        for booking in tables.bookings.iter_mut().filter(|b| b.order_id == order_id) {
            if booking.status.releases_seats(status) {
                freed.push((booking.flight_id, reserved_by(booking)));
            }
            if booking.status != status {
                booking.status = status;
                booking.updated_at = now;
            }
        }
        for (flight_id, reserved) in freed {
            tables.give_back(flight_id, reserved);
        }
        Ok(())
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut expired: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at < now)
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id)));
        Ok(expired)
    }

    async fn cancel_and_release(&self, booking: &Booking) -> CoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let Some(stored) = tables
            .bookings
            .iter_mut()
            .find(|b| b.id == booking.id && b.status == BookingStatus::Pending)
        else {
            return Ok(false);
        };

        stored.status = BookingStatus::Cancelled;
        stored.updated_at = now;
        let flight_id = stored.flight_id;
        let order_id = stored.order_id.clone();
        let reserved = reserved_by(stored);

        for payment in tables
            .payments
            .iter_mut()
            .filter(|p| p.order_id == order_id && p.status == PaymentStatus::Pending)
        {
            payment.status = PaymentStatus::Expired;
            payment.updated_at = now;
        }

        tables.give_back(flight_id, reserved);
        Ok(true)
    }

    async fn archive_departed(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let arrived: HashSet<FlightId> = tables
            .flights
            .values()
            .filter(|f| f.arrival_time < now)
            .map(|f| f.id)
            .collect();

        let mut archived = 0;
        for booking in tables
            .bookings
            .iter_mut()
            .filter(|b| b.status == BookingStatus::Paid && arrived.contains(&b.flight_id))
        {
            booking.status = BookingStatus::Expired;
            booking.updated_at = now;
            archived += 1;
        }
        Ok(archived)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn upsert_payment(&self, payment: &NewPayment) -> CoreResult<Payment> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(existing) = tables.payments.iter_mut().find(|p| p.order_id == payment.order_id) {
            if existing.status == PaymentStatus::Paid {
                return Err(CoreError::AlreadyPaid(payment.order_id.clone()));
            }
            existing.transaction_id = payment.transaction_id.clone();
            existing.payment_method = payment.payment_method.clone();
            existing.status = PaymentStatus::Pending;
            existing.amount = payment.amount;
            existing.currency = payment.currency.clone();
            existing.display = payment.display.clone();
            existing.paid_at = None;
            existing.expires_at = payment.expires_at;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        tables.next_payment_id += 1;
        let stored = Payment {
            id: tables.next_payment_id,
            order_id: payment.order_id.clone(),
            transaction_id: payment.transaction_id.clone(),
            payment_method: payment.payment_method.clone(),
            status: PaymentStatus::Pending,
            amount: payment.amount,
            currency: payment.currency.clone(),
            display: payment.display.clone(),
            paid_at: None,
            expires_at: payment.expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables.payments.iter().find(|p| p.order_id == order_id).cloned())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> CoreResult<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned())
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        let payment = tables
            .payments
            .iter_mut()
            .find(|p| p.order_id == order_id)
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        payment.status = status;
        payment.paid_at = paid_at.or(payment.paid_at);
        payment.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CatalogService for MemoryStore {
    async fn flight_by_id(&self, id: FlightId) -> CoreResult<Option<FlightSummary>> {
        Ok(self.tables.lock().await.flights.get(&id).cloned())
    }
}

#[async_trait]
impl IdentityService for MemoryStore {
    async fn user_by_id(&self, id: UserId) -> CoreResult<Option<UserProfile>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use skyhold_core::catalog::FlightClass;
    use skyhold_core::{NewBookingDetail, PassengerType, TripType};
    use std::sync::Arc;

    fn flight(id: FlightId, economy_seats: i32) -> FlightSummary {
        let departure = Utc.with_ymd_and_hms(2030, 1, 10, 8, 0, 0).unwrap();
        FlightSummary {
            id,
            flight_code: format!("SK{}", id),
            origin: "CGK".to_string(),
            destination: "DPS".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(2),
            classes: vec![FlightClass {
                flight_id: id,
                seat_class: SeatClass::Economy,
                price: dec!(1000000),
                total_seats: economy_seats,
            }],
        }
    }

    fn new_booking(order_id: &str, flight_id: FlightId, code: &str, passengers: usize) -> NewBooking {
        let now = Utc::now();
        NewBooking {
            order_id: order_id.to_string(),
            user_id: 1,
            flight_id,
            booking_code: code.to_string(),
            trip_type: TripType::OneWay,
            seat_class: SeatClass::Economy,
            total_price: dec!(1000000) * rust_decimal::Decimal::from(passengers),
            expires_at: now + Duration::minutes(55),
            created_at: now,
            passengers: (0..passengers)
                .map(|i| NewBookingDetail {
                    passenger_title: "Mr".to_string(),
                    passenger_name: format!("Passenger {}", i),
                    passenger_dob: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
                    passenger_type: PassengerType::Adult,
                    nationality: "ID".to_string(),
                    passport_number: None,
                    issuing_country: None,
                    valid_until: None,
                    ticket_number: format!("{}-{:03}", code, i),
                    price: dec!(1000000),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        store.add_flight(flight(1, 5)).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve(1, SeatClass::Economy, 1).await.is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_reserve_then_release_restores_counter() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 9)).await;

        store.reserve(1, SeatClass::Economy, 4).await.unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(5));
        store.release(1, SeatClass::Economy, 4).await.unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(9));

        let err = store.reserve(1, SeatClass::Business, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { .. }));
    }

    #[tokio::test]
    async fn test_create_order_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 3)).await;
        store.add_flight(flight(2, 1)).await;

        let outbound = new_booking("ORD-1", 1, "SKYAAAAA", 2);
        let inbound = new_booking("ORD-1", 2, "SKYBBBBB", 2);

        let err = store.create_order(&[outbound, inbound]).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { flight_id: 2, .. }));
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(3));
        assert!(BookingRepository::find_by_order_id(&store, "ORD-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_booking_code_is_rejected() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 10)).await;

        store.create_order(&[new_booking("ORD-1", 1, "SKYAAAAA", 1)]).await.unwrap();
        let err = store
            .create_order(&[new_booking("ORD-2", 1, "SKYAAAAA", 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateCode));
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_cancel_and_release_happens_once() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 10)).await;

        let created = store
            .create_order(&[new_booking("ORD-1", 1, "SKYAAAAA", 3)])
            .await
            .unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(7));

        assert!(store.cancel_and_release(&created[0]).await.unwrap());
        assert!(!store.cancel_and_release(&created[0]).await.unwrap());
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(10));

        let err = BookingRepository::update_status(&store, "ORD-1", BookingStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyCancelled(_)));
    }

    #[tokio::test]
    async fn test_reused_order_id_is_rejected() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 10)).await;

        store.create_order(&[new_booking("ORD-1", 1, "SKYAAAAA", 1)]).await.unwrap();
        let mut other_user = new_booking("ORD-1", 1, "SKYBBBBB", 2);
        other_user.user_id = 2;
        let err = store.create_order(&[other_user]).await.unwrap_err();

        assert!(matches!(err, CoreError::DuplicateCode));
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(9));
        let owners: Vec<UserId> = BookingRepository::find_by_order_id(&store, "ORD-1")
            .await
            .unwrap()
            .iter()
            .map(|b| b.user_id)
            .collect();
        assert_eq!(owners, vec![1]);
    }

    #[tokio::test]
    async fn test_leaving_pending_unpaid_releases_seats() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 10)).await;

        store.create_order(&[new_booking("ORD-1", 1, "SKYAAAAA", 3)]).await.unwrap();
        store.create_order(&[new_booking("ORD-2", 1, "SKYBBBBB", 2)]).await.unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(5));

        BookingRepository::update_status(&store, "ORD-1", BookingStatus::Failed).await.unwrap();
        // Redelivery must not release twice
        BookingRepository::update_status(&store, "ORD-1", BookingStatus::Failed).await.unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(8));

        BookingRepository::update_status(&store, "ORD-2", BookingStatus::Paid).await.unwrap();
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_non_positive_counts_are_rejected() {
        let store = MemoryStore::new();
        store.add_flight(flight(1, 4)).await;

        for count in [0, -3] {
            let err = store.reserve(1, SeatClass::Economy, count).await.unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)));
            let err = store.release(1, SeatClass::Economy, count).await.unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)));
        }
        assert_eq!(store.remaining(1, SeatClass::Economy).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_settled_payment_is_not_replaced() {
        let store = MemoryStore::new();
        let payment = NewPayment {
            order_id: "ORD-1".to_string(),
            transaction_id: "tx-1".to_string(),
            payment_method: "qris".to_string(),
            amount: dec!(500000),
            currency: "IDR".to_string(),
            display: None,
            expires_at: Utc::now() + Duration::minutes(30),
        };

        store.upsert_payment(&payment).await.unwrap();
        PaymentRepository::update_status(&store, "ORD-1", PaymentStatus::Paid, Some(Utc::now()))
            .await
            .unwrap();

        let retry = NewPayment { transaction_id: "tx-2".to_string(), ..payment };
        let err = store.upsert_payment(&retry).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyPaid(_)));
    }
}
