use chrono::NaiveDate;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RolloverStats {
    pub stopped_sessions: usize,
    pub purged_plans: usize,
    pub pruned_locks: usize,
    pub pruned_sessions: usize,
}

/// Stops sessions left on an earlier plan, evicts yesterday's cached plans
/// and forgets idle per-learner state.
pub async fn roll_over(state: &AppState, today: NaiveDate) -> RolloverStats {
    let stats = RolloverStats {
        stopped_sessions: state.sessions().stop_stale(today).await,
        purged_plans: state.plan_cache().purge_before(today),
        pruned_locks: state.locks().prune_idle(),
        pruned_sessions: state.sessions().prune_idle(),
    };

    info!(
        %today,
        stopped_sessions = stats.stopped_sessions,
        purged_plans = stats.purged_plans,
        pruned_locks = stats.pruned_locks,
        pruned_sessions = stats.pruned_sessions,
        "Daily rollover completed"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::planning::{build, PlanRequest};
    use crate::services::plan_suggester::PlanSuggester;
    use crate::services::{plan, session};
    use crate::session::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_rollover_purges_previous_days() {
        let state = AppState::new(
            Store::in_memory().await.unwrap(),
            PlanSuggester::disabled(),
            "en",
        );
        let today = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 5).unwrap();
        let yesterday = today - Duration::days(1);

        state
            .plan_cache()
            .insert("a", build(&PlanRequest::new(yesterday)));
        state.plan_cache().insert("b", build(&PlanRequest::new(today)));
        drop(state.locks().lock("a").await);
        state.sessions().timer("a");

        let stats = roll_over(&state, today.date_naive()).await;
        assert_eq!(stats.stopped_sessions, 0);
        assert_eq!(stats.purged_plans, 1);
        assert_eq!(stats.pruned_locks, 1);
        assert_eq!(stats.pruned_sessions, 1);
        assert_eq!(state.plan_cache().len(), 1);
        assert!(state.plan_cache().get("b", today.date_naive()).is_some());
        assert!(state.locks().is_empty());
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_rollover_stops_sessions_on_previous_plan() {
        let clock = ManualClock::new();
        let state = AppState::with_clock(
            Store::in_memory().await.unwrap(),
            PlanSuggester::disabled(),
            "en",
            Arc::new(clock.clone()),
        );
        let today = Utc::now();
        let yesterday = today - Duration::days(1);
        let plan = plan::daily_plan(&state, "a", Some(20), yesterday).await;
        let activity_id = plan.activities[0].id.clone();
        session::start(&state, "a", &activity_id, yesterday)
            .await
            .unwrap();
        clock.advance_secs(150);

        let stats = roll_over(&state, today.date_naive()).await;
        assert_eq!(stats.stopped_sessions, 1);
        assert_eq!(stats.pruned_sessions, 1);
        assert!(state.sessions().is_empty());

        let reloaded = plan::daily_plan(&state, "a", None, yesterday).await;
        assert_eq!(reloaded.activity(&activity_id).unwrap().minutes_spent, 2);
    }
}
