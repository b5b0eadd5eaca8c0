use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::services::session::SessionRegistry;

/// Drives every running session timer at `period` until shutdown fires.
pub fn spawn(
    sessions: Arc<SessionRegistry>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "Session ticker started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    let flushed = sessions.tick_all().await;
                    if flushed > 0 {
                        debug!(minutes = flushed, "Session ticker flushed minutes");
                    }
                }
            }
        }

        info!("Session ticker stopped");
    })
}
