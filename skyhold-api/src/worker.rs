use chrono::Utc;
use skyhold_order::ExpirySweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Runs the expiry sweep every `every` until `shutdown` flips. A sweep in
/// progress finishes before the worker returns; ticks missed while it runs
/// are skipped.
pub async fn start_expiry_worker(
    sweeper: Arc<ExpirySweeper>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Expiry worker started, sweeping every {:?}", every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweeper.process_expired_bookings(Utc::now()).await;
            }
            _ = shutdown.changed() => {
                info!("Expiry worker stopping");
                break;
            }
        }
    }
}
