use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::cache::DailyPlanCache;
use crate::core::EventBus;
use crate::db::Store;
use crate::services::{plan, ServiceError};
use crate::session::{
    ActivityRef, MonotonicClock, PendingFlush, ProgressSink, SessionSnapshot, SessionState,
    SessionSummary, SessionTimer, TimerError,
};
use crate::state::AppState;

pub type LearnerTimer = SessionTimer<Arc<dyn MonotonicClock>, Store>;

/// One timer per learner, created on first use.
pub struct SessionRegistry {
    timers: Mutex<HashMap<String, Arc<AsyncMutex<LearnerTimer>>>>,
    clock: Arc<dyn MonotonicClock>,
    store: Store,
    bus: Arc<EventBus>,
    plan_cache: Arc<DailyPlanCache>,
}

impl SessionRegistry {
    pub fn new(
        store: Store,
        bus: Arc<EventBus>,
        plan_cache: Arc<DailyPlanCache>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            clock,
            store,
            bus,
            plan_cache,
        }
    }

    pub fn timer(&self, learner_id: &str) -> Arc<AsyncMutex<LearnerTimer>> {
        let mut timers = self.timers.lock();
        timers
            .entry(learner_id.to_string())
            .or_insert_with(|| {
                Arc::new(AsyncMutex::new(SessionTimer::new(
                    self.clock.clone(),
                    self.store.clone(),
                    Arc::clone(&self.bus),
                )))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ticks every timer. Learners are ticked concurrently and no timer is
    /// locked while its minutes are written. Returns how many minutes were
    /// flushed.
    pub async fn tick_all(&self) -> u32 {
        let timers: Vec<_> = self.timers.lock().values().cloned().collect();
        join_all(timers.iter().map(|timer| self.tick_one(timer)))
            .await
            .into_iter()
            .flatten()
            .sum()
    }

    async fn tick_one(&self, timer: &Arc<AsyncMutex<LearnerTimer>>) -> Option<u32> {
        let pending = timer.lock().await.begin_tick()?;
        self.write(timer, pending).await
    }

    /// Pauses the learner's timer, writing its pending minutes after the
    /// timer lock is released.
    pub async fn pause(&self, learner_id: &str) -> Result<SessionSnapshot, TimerError> {
        let timer = self.timer(learner_id);
        let pending = timer.lock().await.begin_pause()?;
        if let Some(pending) = pending {
            self.write(&timer, pending).await;
        }
        let snapshot = timer.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Stops sessions still timing an activity from a plan before `today`.
    /// Their completed minutes are flushed to that day's plan first.
    pub async fn stop_stale(&self, today: NaiveDate) -> usize {
        let timers: Vec<_> = self.timers.lock().values().cloned().collect();
        let mut stopped = 0;
        for timer in timers {
            let pending = {
                let mut guard = timer.lock().await;
                if !is_stale(&guard, today) {
                    continue;
                }
                guard.begin_flush()
            };
            if let Some(pending) = pending {
                self.write(&timer, pending).await;
            }

            let mut guard = timer.lock().await;
            if is_stale(&guard, today) {
                if let Ok(summary) = guard.stop() {
                    debug!(
                        activity_id = %summary.activity_id,
                        plan_date = %summary.plan_date,
                        "Stale session stopped"
                    );
                    stopped += 1;
                }
            }
        }
        stopped
    }

    async fn write(&self, timer: &AsyncMutex<LearnerTimer>, pending: PendingFlush) -> Option<u32> {
        let result = self
            .store
            .add_minutes(&pending.activity, pending.minutes)
            .await;
        let written = timer.lock().await.finish_flush(&pending, result);
        if written.is_some() {
            self.plan_cache
                .invalidate(&pending.activity.learner_id, pending.activity.plan_date);
        }
        written
    }

    /// Forgets idle timers nobody else holds.
    pub fn prune_idle(&self) -> usize {
        let mut timers = self.timers.lock();
        let before = timers.len();
        timers.retain(|_, timer| {
            Arc::strong_count(timer) > 1
                || timer
                    .try_lock()
                    .map_or(true, |t| t.state() != SessionState::Idle)
        });
        before - timers.len()
    }
}

fn is_stale(timer: &LearnerTimer, today: NaiveDate) -> bool {
    timer.activity().is_some_and(|a| a.plan_date < today)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub session: SessionSnapshot,
    /// Summary of a session that was running when this one started.
    pub stopped: Option<SessionSummary>,
}

/// Starts timing an activity from the learner's plan for `now`'s UTC day.
pub async fn start(
    state: &AppState,
    learner_id: &str,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<StartOutcome, ServiceError> {
    let today = plan::daily_plan(state, learner_id, None, now).await;
    if today.activity(activity_id).is_none() {
        return Err(ServiceError::NotFound(format!("activity {activity_id}")));
    }

    let activity = ActivityRef {
        learner_id: learner_id.to_string(),
        plan_date: today.date,
        activity_id: activity_id.to_string(),
    };

    let timer = state.sessions().timer(learner_id);
    let mut timer = timer.lock().await;
    let stopped = timer.start(activity).await;
    info!(learner_id = %learner_id, activity_id = %activity_id, "Session started");

    Ok(StartOutcome {
        session: timer.snapshot(),
        stopped,
    })
}

pub async fn pause(state: &AppState, learner_id: &str) -> Result<SessionSnapshot, ServiceError> {
    Ok(state.sessions().pause(learner_id).await?)
}

pub async fn resume(state: &AppState, learner_id: &str) -> Result<SessionSnapshot, ServiceError> {
    let timer = state.sessions().timer(learner_id);
    let mut timer = timer.lock().await;
    Ok(timer.resume()?)
}

pub async fn stop(state: &AppState, learner_id: &str) -> Result<SessionSummary, ServiceError> {
    let timer = state.sessions().timer(learner_id);
    let mut timer = timer.lock().await;
    let summary = timer.stop()?;
    debug!(
        learner_id = %learner_id,
        elapsed_secs = summary.elapsed_seconds,
        "Session stop requested"
    );
    Ok(summary)
}

pub async fn cancel(state: &AppState, learner_id: &str) -> Result<(), ServiceError> {
    let timer = state.sessions().timer(learner_id);
    let mut timer = timer.lock().await;
    Ok(timer.cancel()?)
}

pub async fn current(state: &AppState, learner_id: &str) -> SessionSnapshot {
    let timer = state.sessions().timer(learner_id);
    let timer = timer.lock().await;
    timer.snapshot()
}

/// Stops the learner's timer if it is on `activity_id`.
pub async fn stop_if_on(
    state: &AppState,
    learner_id: &str,
    activity_id: &str,
) -> Option<SessionSummary> {
    let timer = state.sessions().timer(learner_id);
    let mut timer = timer.lock().await;
    let on_activity = timer
        .activity()
        .is_some_and(|a| a.activity_id == activity_id);
    if on_activity {
        timer.stop().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::plan_suggester::PlanSuggester;
    use crate::session::ManualClock;

    async fn state() -> (AppState, ManualClock) {
        let clock = ManualClock::new();
        let state = AppState::with_clock(
            Store::in_memory().await.unwrap(),
            PlanSuggester::disabled(),
            "es",
            Arc::new(clock.clone()),
        );
        (state, clock)
    }

    #[tokio::test]
    async fn test_session_lifecycle_flushes_to_store() {
        let (state, clock) = state().await;
        let now = Utc::now();
        let plan = plan::daily_plan(&state, "l1", Some(20), now).await;
        let activity_id = plan.activities[0].id.clone();

        let started = start(&state, "l1", &activity_id, now).await.unwrap();
        assert_eq!(started.session.state, SessionState::Running);
        assert!(started.stopped.is_none());

        clock.advance_secs(65);
        let paused = pause(&state, "l1").await.unwrap();
        assert_eq!(paused.flushed_minutes, 1);

        resume(&state, "l1").await.unwrap();
        clock.advance_secs(40);
        let summary = stop(&state, "l1").await.unwrap();
        assert_eq!(summary.elapsed_seconds, 105);

        let reloaded = plan::daily_plan(&state, "l1", None, now).await;
        let activity = reloaded.activity(&activity_id).unwrap();
        assert_eq!(activity.minutes_spent, 1);
    }

    #[tokio::test]
    async fn test_start_unknown_activity() {
        let (state, _clock) = state().await;
        let err = start(&state, "l1", "1999-01-01-9", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_operations_without_session() {
        let (state, _clock) = state().await;
        assert!(matches!(
            pause(&state, "l1").await.unwrap_err(),
            ServiceError::Session(TimerError::NoActiveSession)
        ));
        assert_eq!(current(&state, "l1").await.state, SessionState::Idle);
        assert!(stop_if_on(&state, "l1", "x").await.is_none());
    }

    #[tokio::test]
    async fn test_tick_all_flushes_running_timers() {
        let (state, clock) = state().await;
        let now = Utc::now();
        let plan = plan::daily_plan(&state, "l1", Some(30), now).await;
        start(&state, "l1", &plan.activities[1].id, now).await.unwrap();

        clock.advance_secs(61);
        assert_eq!(state.sessions().tick_all().await, 1);
        assert_eq!(state.sessions().tick_all().await, 0);

        cancel(&state, "l1").await.unwrap();
        assert_eq!(state.sessions().prune_idle(), 1);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_pause_not_blocked_by_in_flight_flush() {
        let (state, clock) = state().await;
        let now = Utc::now();
        let plan = plan::daily_plan(&state, "l1", Some(20), now).await;
        let activity_id = plan.activities[0].id.clone();
        start(&state, "l1", &activity_id, now).await.unwrap();

        clock.advance_secs(70);
        let timer = state.sessions().timer("l1");
        let in_flight = timer.lock().await.begin_tick().unwrap();

        clock.advance_secs(60);
        let paused = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            pause(&state, "l1"),
        )
        .await
        .expect("pause waited on the in-flight flush")
        .unwrap();
        assert_eq!(paused.state, SessionState::Paused);
        assert_eq!(paused.flushed_minutes, 1);

        state.store().add_minutes(&in_flight.activity, 1).await.unwrap();
        timer.lock().await.finish_flush(&in_flight, Ok::<(), String>(()));
        assert_eq!(current(&state, "l1").await.flushed_minutes, 2);

        let reloaded = plan::daily_plan(&state, "l1", None, now).await;
        assert_eq!(reloaded.activity(&activity_id).unwrap().minutes_spent, 2);
    }

    #[tokio::test]
    async fn test_tick_all_retries_paused_leftover() {
        let (state, clock) = state().await;
        let now = Utc::now();
        let plan = plan::daily_plan(&state, "l1", Some(20), now).await;
        start(&state, "l1", &plan.activities[0].id, now).await.unwrap();

        clock.advance_secs(125);
        let timer = state.sessions().timer("l1");
        let failed = timer.lock().await.begin_pause().unwrap().unwrap();
        timer
            .lock()
            .await
            .finish_flush(&failed, Err::<(), _>("database locked"));

        assert_eq!(state.sessions().tick_all().await, 2);
        let summary = stop(&state, "l1").await.unwrap();
        assert_eq!(summary.flushed_minutes, 2);
    }

    #[tokio::test]
    async fn test_stop_stale_flushes_and_stops_previous_day() {
        let (state, clock) = state().await;
        let yesterday = Utc::now() - chrono::Duration::days(1);
        let plan = plan::daily_plan(&state, "l1", Some(20), yesterday).await;
        let activity_id = plan.activities[0].id.clone();
        start(&state, "l1", &activity_id, yesterday).await.unwrap();
        clock.advance_secs(90);

        let today = Utc::now().date_naive();
        assert_eq!(state.sessions().stop_stale(yesterday.date_naive()).await, 0);
        assert_eq!(state.sessions().stop_stale(today).await, 1);
        assert_eq!(current(&state, "l1").await.state, SessionState::Idle);

        let reloaded = plan::daily_plan(&state, "l1", None, yesterday).await;
        assert_eq!(reloaded.activity(&activity_id).unwrap().minutes_spent, 1);
    }
}
