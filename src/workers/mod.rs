mod daily_rollover;
mod session_ticker;

pub use daily_rollover::{roll_over, RolloverStats};

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::state::AppState;

/// Midnight UTC, when plan dates roll over.
pub const ROLLOVER_SCHEDULE: &str = "0 0 0 * * *";

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    state: AppState,
    tick_period: Duration,
}

impl WorkerManager {
    pub async fn new(state: AppState, tick_period: Duration) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            ticker: Mutex::new(None),
            state,
            tick_period,
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        let scheduler = self.scheduler.lock().await;

        let state = self.state.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(ROLLOVER_SCHEDULE, move |_uuid, _lock| {
            let state = state.clone();
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    _ = roll_over(&state, Utc::now().date_naive()) => {}
                }
            })
        })?;
        scheduler.add(job).await?;
        info!(schedule = ROLLOVER_SCHEDULE, "Daily rollover worker scheduled");

        let handle = session_ticker::spawn(
            self.state.sessions(),
            self.tick_period,
            self.shutdown_tx.subscribe(),
        );
        *self.ticker.lock().await = Some(handle);

        scheduler.start().await?;
        info!("All workers started");
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.ticker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Session ticker did not stop cleanly");
            }
        }

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
