use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::booking::{Booking, BookingStatus, FlightId, NewBooking, SeatClass, UserId};
use crate::payment::{NewPayment, Payment, PaymentStatus};
use crate::{CoreError, CoreResult};

/// Seat counts moved through the ledger must be positive; a negative
/// decrement would add seats.
pub fn ensure_seat_count(count: i32) -> CoreResult<()> {
    if count <= 0 {
        return Err(CoreError::ValidationError(format!("seat count must be positive, got {}", count)));
    }
    Ok(())
}

/// Remaining-seat counters per (flight, seat class)
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Conditionally take `count` seats. Fails with `InsufficientInventory`
    /// without touching the counter when fewer seats remain.
    async fn reserve(&self, flight_id: FlightId, seat_class: SeatClass, count: i32) -> CoreResult<()>;

    /// Give `count` seats back. Unconditional; callers guarantee a release
    /// happens once per reservation.
    async fn release(&self, flight_id: FlightId, seat_class: SeatClass, count: i32) -> CoreResult<()>;

    async fn remaining(&self, flight_id: FlightId, seat_class: SeatClass) -> CoreResult<Option<i32>>;
}

/// Repository for bookings and their passenger details
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Reserve inventory for every booking and insert all of them in one
    /// transaction. Either every segment is persisted or none is.
    async fn create_order(&self, bookings: &[NewBooking]) -> CoreResult<Vec<Booking>>;

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Vec<Booking>>;

    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Vec<Booking>>;

    /// Move every booking of the order to `status`, guarded by
    /// `booking::guard_transition` under a row lock. A pending booking that
    /// becomes cancelled or failed gives its seats back in the same
    /// transaction.
    async fn update_status(&self, order_id: &str, status: BookingStatus) -> CoreResult<()>;

    /// Pending bookings whose deadline is before `now`
    async fn expired_pending(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>>;

    /// Cancel a pending booking, expire its order's open payment and release
    /// its seats in one transaction. Returns `false` when the booking was no
    /// longer pending, in which case nothing is released.
    async fn cancel_and_release(&self, booking: &Booking) -> CoreResult<bool>;

    /// Flip paid bookings whose flight has arrived before `now` to expired.
    async fn archive_departed(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert the order's payment or replace the open one (method change).
    /// Fails with `AlreadyPaid` when the existing payment is settled.
    async fn upsert_payment(&self, payment: &NewPayment) -> CoreResult<Payment>;

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Payment>>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> CoreResult<Option<Payment>>;

    async fn update_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()>;
}
