use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use skyhold_core::catalog::{FlightClass, FlightSummary};
use skyhold_core::identity::UserProfile;
use skyhold_core::SeatClass;
use skyhold_shared::Masked;
use skyhold_store::MemoryStore;
use std::sync::Arc;

use crate::assembler::{OrderAssembler, OrderItem, PassengerInput};

pub const EXPENSIVE_ECONOMY: Decimal = dec!(1250000);
pub const WEBHOOK_TOKEN: &str = "test-callback-token";

/// User 1; flights 1 and 2 with 5 economy seats each, business 4 and 2
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .add_user(UserProfile {
            id: 1,
            full_name: "Budi Santoso".to_string(),
            email: Masked::new("budi@example.com".to_string()),
        })
        .await;
    store.add_flight(flight(1, "SK101", 4)).await;
    store.add_flight(flight(2, "SK102", 2)).await;
    store
}

pub fn flight(id: i64, code: &str, business_seats: i32) -> FlightSummary {
    let departure = Utc.with_ymd_and_hms(2030, 3, 1, 6, 0, 0).unwrap() + Duration::hours(id);
    FlightSummary {
        id,
        flight_code: code.to_string(),
        origin: "CGK".to_string(),
        destination: "DPS".to_string(),
        departure_time: departure,
        arrival_time: departure + Duration::hours(2),
        classes: vec![
            FlightClass {
                flight_id: id,
                seat_class: SeatClass::Economy,
                price: EXPENSIVE_ECONOMY,
                total_seats: 5,
            },
            FlightClass {
                flight_id: id,
                seat_class: SeatClass::Business,
                price: dec!(4500000),
                total_seats: business_seats,
            },
        ],
    }
}

pub fn assembler(store: &Arc<MemoryStore>) -> OrderAssembler {
    OrderAssembler::new(store.clone(), store.clone(), store.clone())
}

pub fn adult(name: &str) -> PassengerInput {
    PassengerInput {
        title: "Mr".to_string(),
        full_name: name.to_string(),
        dob: NaiveDate::from_ymd_opt(1988, 4, 12).unwrap(),
        nationality: "ID".to_string(),
        passport_number: Some(Masked::new("A1234567".to_string())),
        issuing_country: Some("ID".to_string()),
        valid_until: NaiveDate::from_ymd_opt(2032, 1, 1),
    }
}

pub fn item(flight_id: i64, seat_class: &str, passengers: Vec<PassengerInput>) -> OrderItem {
    OrderItem {
        flight_id,
        seat_class: seat_class.to_string(),
        passengers,
    }
}
