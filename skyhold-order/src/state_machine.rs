use skyhold_core::repository::BookingRepository;
use skyhold_core::{Booking, BookingStatus, CoreResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Applies lifecycle transitions to every booking of an order.
///
/// pending -> paid | cancelled | failed, paid -> expired. The guard itself
/// runs inside the repository under a row lock (`guard_transition`); a
/// cancelled booking answers every request with `AlreadyCancelled`.
#[derive(Clone)]
pub struct BookingStateMachine {
    bookings: Arc<dyn BookingRepository>,
}

impl BookingStateMachine {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn transition(&self, order_id: &str, next: BookingStatus) -> CoreResult<()> {
        self.bookings.update_status(order_id, next).await?;
        info!("Order {} -> {}", order_id, next);
        Ok(())
    }

    /// Transition: pending -> paid (settlement received)
    pub async fn mark_paid(&self, order_id: &str) -> CoreResult<()> {
        self.transition(order_id, BookingStatus::Paid).await
    }

    /// Transition: pending -> failed (payment denied)
    pub async fn mark_failed(&self, order_id: &str) -> CoreResult<()> {
        self.transition(order_id, BookingStatus::Failed).await
    }

    /// Cancel one pending booking and give its seats back. `false` when
    /// someone else already moved it out of pending.
    pub async fn cancel_and_release(&self, booking: &Booking) -> CoreResult<bool> {
        let acted = self.bookings.cancel_and_release(booking).await?;
        if acted {
            info!(
                "Booking {} ({}) cancelled, {} seat(s) released",
                booking.booking_code,
                booking.order_id,
                booking.reserved_seats()
            );
        } else {
            debug!("Booking {} already left pending", booking.booking_code);
        }
        Ok(acted)
    }
}
