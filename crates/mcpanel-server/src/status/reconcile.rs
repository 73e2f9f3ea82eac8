//! Periodic drift correction.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::machine::StatusMachine;

/// Reconcile `machine` against its probe every `period` until cancelled.
pub async fn run_reconciler(
    machine: Arc<StatusMachine>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let _ = machine.reconcile().await;
            }
        }
    }
    info!("status reconciler stopped");
}
