//! Per-learner study timer.
//!
//! `Idle -> Running <-> Paused -> Idle`. Elapsed time comes from a monotonic
//! clock. Whole minutes are flushed to a [`ProgressSink`] on tick boundaries
//! and on pause; stop and cancel never flush.
//!
//! A flush is split into [`SessionTimer::begin_flush`], the sink write, and
//! [`SessionTimer::finish_flush`] so callers can perform the write without
//! holding the timer. Minutes reserved by an in-flight write are not handed
//! out again.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::MonotonicClock;
use crate::core::{EventBus, FlushedPayload, SessionEvent, StateChangedPayload, TickPayload};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRef {
    pub learner_id: String,
    pub plan_date: NaiveDate,
    pub activity_id: String,
}

/// Persistent store of minutes spent per plan activity.
pub trait ProgressSink: Send + Sync {
    type Error: Display + Send;

    fn load_minutes(
        &self,
        activity: &ActivityRef,
    ) -> impl Future<Output = Result<u32, Self::Error>> + Send;

    fn add_minutes(
        &self,
        activity: &ActivityRef,
        minutes: u32,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("no active session")]
    NoActiveSession,
    #[error("session is not running")]
    NotRunning,
    #[error("session is not paused")]
    NotPaused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub activity_id: String,
    pub plan_date: NaiveDate,
    pub elapsed_seconds: u64,
    pub cumulative_seconds: u64,
    pub flushed_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub activity_id: Option<String>,
    pub plan_date: Option<NaiveDate>,
    pub elapsed_seconds: u64,
    pub cumulative_seconds: u64,
    pub seeded_minutes: u32,
    pub flushed_minutes: u32,
}

/// Whole minutes reserved for one sink write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFlush {
    pub activity: ActivityRef,
    pub minutes: u32,
    generation: u64,
}

#[derive(Debug)]
struct ActiveSession {
    activity: ActivityRef,
    generation: u64,
    seeded_minutes: u32,
    accumulated: Duration,
    running_since: Option<Duration>,
    flushed_minutes: u32,
    in_flight_minutes: u32,
}

impl ActiveSession {
    fn state(&self) -> SessionState {
        if self.running_since.is_some() {
            SessionState::Running
        } else {
            SessionState::Paused
        }
    }

    fn elapsed(&self, now: Duration) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + now.saturating_sub(since),
            None => self.accumulated,
        }
    }

    fn cumulative_secs(&self, now: Duration) -> u64 {
        u64::from(self.seeded_minutes) * 60 + self.elapsed(now).as_secs()
    }
}

pub struct SessionTimer<C, S> {
    clock: C,
    sink: S,
    bus: Arc<EventBus>,
    session: Option<ActiveSession>,
    generation: u64,
}

impl<C: MonotonicClock, S: ProgressSink> SessionTimer<C, S> {
    pub fn new(clock: C, sink: S, bus: Arc<EventBus>) -> Self {
        Self {
            clock,
            sink,
            bus,
            session: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, ActiveSession::state)
    }

    pub fn activity(&self) -> Option<&ActivityRef> {
        self.session.as_ref().map(|s| &s.activity)
    }

    /// Time accumulated by the current session alone.
    pub fn elapsed(&self) -> Duration {
        let now = self.clock.now();
        self.session
            .as_ref()
            .map(|s| s.elapsed(now))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.clock.now();
        match &self.session {
            Some(s) => SessionSnapshot {
                state: s.state(),
                activity_id: Some(s.activity.activity_id.clone()),
                plan_date: Some(s.activity.plan_date),
                elapsed_seconds: s.elapsed(now).as_secs(),
                cumulative_seconds: s.cumulative_secs(now),
                seeded_minutes: s.seeded_minutes,
                flushed_minutes: s.flushed_minutes,
            },
            None => SessionSnapshot {
                state: SessionState::Idle,
                activity_id: None,
                plan_date: None,
                elapsed_seconds: 0,
                cumulative_seconds: 0,
                seeded_minutes: 0,
                flushed_minutes: 0,
            },
        }
    }

    /// Starts timing `activity`. An active session is stopped first and its
    /// summary returned.
    pub async fn start(&mut self, activity: ActivityRef) -> Option<SessionSummary> {
        let previous = if self.session.is_some() {
            self.stop().ok()
        } else {
            None
        };

        let seeded_minutes = match self.sink.load_minutes(&activity).await {
            Ok(minutes) => minutes,
            Err(e) => {
                warn!(
                    learner_id = %activity.learner_id,
                    activity_id = %activity.activity_id,
                    error = %e,
                    "Failed to load persisted minutes, starting from zero"
                );
                0
            }
        };

        self.generation += 1;
        self.session = Some(ActiveSession {
            activity,
            generation: self.generation,
            seeded_minutes,
            accumulated: Duration::ZERO,
            running_since: Some(self.clock.now()),
            flushed_minutes: 0,
            in_flight_minutes: 0,
        });
        self.publish_state(SessionState::Idle, SessionState::Running);
        previous
    }

    /// Freezes accumulation. The pending whole-minute delta is written before
    /// this returns.
    pub async fn pause(&mut self) -> Result<SessionSnapshot, TimerError> {
        if let Some(pending) = self.begin_pause()? {
            let result = self.sink.add_minutes(&pending.activity, pending.minutes).await;
            self.finish_flush(&pending, result);
        }
        Ok(self.snapshot())
    }

    /// Freezes accumulation and reserves the whole minutes still to be
    /// written. The caller owns the write.
    pub fn begin_pause(&mut self) -> Result<Option<PendingFlush>, TimerError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(TimerError::NoActiveSession)?;
        let since = session.running_since.take().ok_or(TimerError::NotRunning)?;
        session.accumulated += now.saturating_sub(since);

        self.publish_state(SessionState::Running, SessionState::Paused);
        Ok(self.begin_flush())
    }

    pub fn resume(&mut self) -> Result<SessionSnapshot, TimerError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(TimerError::NoActiveSession)?;
        if session.running_since.is_some() {
            return Err(TimerError::NotPaused);
        }
        session.running_since = Some(now);

        self.publish_state(SessionState::Paused, SessionState::Running);
        Ok(self.snapshot())
    }

    pub fn stop(&mut self) -> Result<SessionSummary, TimerError> {
        let now = self.clock.now();
        let from = self.state();
        let session = self.session.take().ok_or(TimerError::NoActiveSession)?;
        let elapsed = session.elapsed(now);

        self.publish_transition(&session.activity, from, SessionState::Idle, elapsed);
        debug!(
            learner_id = %session.activity.learner_id,
            activity_id = %session.activity.activity_id,
            elapsed_secs = elapsed.as_secs(),
            "Session stopped"
        );

        Ok(SessionSummary {
            activity_id: session.activity.activity_id.clone(),
            plan_date: session.activity.plan_date,
            elapsed_seconds: elapsed.as_secs(),
            cumulative_seconds: session.cumulative_secs(now),
            flushed_minutes: session.flushed_minutes,
        })
    }

    /// Drops the session. Time not yet flushed is discarded.
    pub fn cancel(&mut self) -> Result<(), TimerError> {
        let now = self.clock.now();
        let from = self.state();
        let session = self.session.take().ok_or(TimerError::NoActiveSession)?;
        self.publish_transition(&session.activity, from, SessionState::Idle, session.elapsed(now));
        Ok(())
    }

    /// Emits a tick while running and flushes any completed minutes. Returns
    /// the minutes written, if any.
    pub async fn tick(&mut self) -> Option<u32> {
        let pending = self.begin_tick()?;
        let result = self.sink.add_minutes(&pending.activity, pending.minutes).await;
        self.finish_flush(&pending, result)
    }

    /// Emits a tick while running and reserves unwritten whole minutes. A
    /// paused session still hands out minutes left over by a failed write.
    pub fn begin_tick(&mut self) -> Option<PendingFlush> {
        let now = self.clock.now();
        let session = self.session.as_ref()?;
        if session.state() == SessionState::Running {
            self.bus.publish(SessionEvent::Tick(TickPayload {
                learner_id: session.activity.learner_id.clone(),
                activity_id: session.activity.activity_id.clone(),
                elapsed_seconds: session.elapsed(now).as_secs(),
                cumulative_seconds: session.cumulative_secs(now),
                timestamp: Utc::now(),
            }));
        }
        self.begin_flush()
    }

    /// Reserves whole minutes not yet written or being written.
    pub fn begin_flush(&mut self) -> Option<PendingFlush> {
        let now = self.clock.now();
        let session = self.session.as_mut()?;
        let whole_minutes = u32::try_from(session.elapsed(now).as_secs() / 60).unwrap_or(u32::MAX);
        let delta = whole_minutes
            .saturating_sub(session.flushed_minutes)
            .saturating_sub(session.in_flight_minutes);
        if delta == 0 {
            return None;
        }

        session.in_flight_minutes += delta;
        Some(PendingFlush {
            activity: session.activity.clone(),
            minutes: delta,
            generation: session.generation,
        })
    }

    /// Settles a reservation from [`Self::begin_flush`]. Returns the minutes
    /// the sink accepted. A failed write releases the reservation so the next
    /// tick retries it.
    pub fn finish_flush<E: Display>(
        &mut self,
        pending: &PendingFlush,
        result: Result<(), E>,
    ) -> Option<u32> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.generation == pending.generation);

        match result {
            Ok(()) => {
                if let Some(session) = session {
                    session.in_flight_minutes =
                        session.in_flight_minutes.saturating_sub(pending.minutes);
                    session.flushed_minutes += pending.minutes;
                    self.bus.publish(SessionEvent::Flushed(FlushedPayload {
                        learner_id: session.activity.learner_id.clone(),
                        activity_id: session.activity.activity_id.clone(),
                        plan_date: session.activity.plan_date,
                        minutes: pending.minutes,
                        flushed_minutes: session.flushed_minutes,
                        timestamp: Utc::now(),
                    }));
                }
                Some(pending.minutes)
            }
            Err(e) => {
                if let Some(session) = session {
                    session.in_flight_minutes =
                        session.in_flight_minutes.saturating_sub(pending.minutes);
                }
                warn!(
                    learner_id = %pending.activity.learner_id,
                    activity_id = %pending.activity.activity_id,
                    minutes = pending.minutes,
                    error = %e,
                    "Session flush failed"
                );
                None
            }
        }
    }

    fn publish_state(&self, from: SessionState, to: SessionState) {
        let now = self.clock.now();
        if let Some(session) = &self.session {
            self.publish_transition(&session.activity, from, to, session.elapsed(now));
        }
    }

    fn publish_transition(
        &self,
        activity: &ActivityRef,
        from: SessionState,
        to: SessionState,
        elapsed: Duration,
    ) {
        self.bus
            .publish(SessionEvent::StateChanged(StateChangedPayload {
                learner_id: activity.learner_id.clone(),
                activity_id: activity.activity_id.clone(),
                plan_date: activity.plan_date,
                from,
                to,
                elapsed_seconds: elapsed.as_secs(),
                timestamp: Utc::now(),
            }));
    }
}
