use chrono::{DateTime, Utc};
use serde::Serialize;
use skyhold_core::repository::BookingRepository;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::state_machine::BookingStateMachine;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pending bookings cancelled with their seats released
    pub cancelled: usize,
    /// Bookings that left pending between the scan and the claim
    pub skipped: usize,
    pub failed: usize,
    /// Paid bookings of arrived flights moved to expired
    pub archived: u64,
}

/// Periodic cleanup of abandoned and flown bookings
pub struct ExpirySweeper {
    bookings: Arc<dyn BookingRepository>,
    state_machine: BookingStateMachine,
    running: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self {
            state_machine: BookingStateMachine::new(bookings.clone()),
            bookings,
            running: Mutex::new(()),
        }
    }

    /// Run one sweep. Returns `None` without doing anything when the previous
    /// sweep in this process has not finished yet.
    pub async fn process_expired_bookings(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous expiry sweep still running, skipping this tick");
            return None;
        };

        let mut report = SweepReport::default();

        match self.bookings.expired_pending(now).await {
            Ok(expired) => {
                for booking in &expired {
                    match self.state_machine.cancel_and_release(booking).await {
                        Ok(true) => report.cancelled += 1,
                        Ok(false) => report.skipped += 1,
                        Err(e) => {
                            report.failed += 1;
                            error!("Failed to expire booking {}: {}", booking.booking_code, e);
                        }
                    }
                }
            }
            Err(e) => error!("Failed to load expired pending bookings: {}", e),
        }

        match self.bookings.archive_departed(now).await {
            Ok(archived) => report.archived = archived,
            Err(e) => error!("Failed to archive departed bookings: {}", e),
        }

        if report != SweepReport::default() {
            info!(
                "Expiry sweep: {} cancelled, {} skipped, {} failed, {} archived",
                report.cancelled, report.skipped, report.failed, report.archived
            );
        }
        Some(report)
    }
}
