use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::db::operations::{
    activity_log_since, complete_activity as store_complete_activity, count_due, list_resources,
    list_skills, load_plan, save_plan,
};
use crate::planning::{
    build_with_config, digest, normalize_with_config, CandidatePlan, DailyPlan, PlanActivity,
    PlanRequest,
};
use crate::services::{session, ServiceError};
use crate::state::AppState;

/// Gathers planning inputs for the learner. Every collaborator failure
/// degrades to an empty input instead of an error.
pub async fn build_request(
    state: &AppState,
    learner_id: &str,
    minutes: Option<i64>,
    now: DateTime<Utc>,
) -> PlanRequest {
    let store = state.store();
    let config = state.plan_config();
    let mut request = PlanRequest::new(now);
    request.target_language = state.target_language().to_string();
    if let Some(minutes) = minutes {
        request.preferred_session_minutes = minutes;
    }

    request.vocabulary_due_count = count_due(store, learner_id, now)
        .await
        .unwrap_or_else(|e| {
            warn!(learner_id = %learner_id, error = %e, "Due count unavailable");
            0
        });

    let since = now - Duration::days(config.history_window_days);
    request.recent_history = match activity_log_since(store, learner_id, since).await {
        Ok(log) => digest(&log, config.history_window_days, now),
        Err(e) => {
            warn!(learner_id = %learner_id, error = %e, "Activity log unavailable");
            Vec::new()
        }
    };

    request.available_resources = list_resources(store).await.unwrap_or_else(|e| {
        warn!(error = %e, "Resource catalog unavailable");
        Vec::new()
    });
    request.available_skills = list_skills(store).await.unwrap_or_else(|e| {
        warn!(error = %e, "Skill catalog unavailable");
        Vec::new()
    });

    request
}

/// Today's plan for the learner. Never fails: cache, then the stored plan,
/// then a freshly generated one. `minutes` only matters when generating.
pub async fn daily_plan(
    state: &AppState,
    learner_id: &str,
    minutes: Option<i64>,
    now: DateTime<Utc>,
) -> DailyPlan {
    let date = now.date_naive();
    let cache = state.plan_cache();

    if let Some(plan) = cache.get(learner_id, date) {
        debug!(learner_id = %learner_id, %date, "Daily plan cache hit");
        return plan;
    }

    match load_plan(state.store(), learner_id, date).await {
        Ok(Some(plan)) => {
            cache.insert(learner_id, plan.clone());
            return plan;
        }
        Ok(None) => {}
        Err(e) => warn!(learner_id = %learner_id, error = %e, "Stored plan unavailable"),
    }

    let request = build_request(state, learner_id, minutes, now).await;
    let plan = generate(state, &request).await;

    if let Err(e) = save_plan(state.store(), learner_id, &plan).await {
        warn!(learner_id = %learner_id, error = %e, "Failed to persist daily plan");
    }
    cache.insert(learner_id, plan.clone());

    info!(
        learner_id = %learner_id,
        %date,
        source = plan.source.as_str(),
        activities = plan.activities.len(),
        minutes = plan.total_estimated_minutes(),
        "Daily plan generated"
    );
    plan
}

async fn generate(state: &AppState, request: &PlanRequest) -> DailyPlan {
    let suggester = state.suggester();
    if suggester.is_available() {
        match suggester.suggest(request).await {
            Ok(candidate) => return normalize_with_config(&candidate, request, state.plan_config()),
            Err(e) => warn!(error = %e, "Plan suggester failed, using deterministic plan"),
        }
    }
    build_with_config(request, state.plan_config())
}

/// Sanitizes a caller-supplied candidate against the learner's current inputs.
/// The result is not stored.
pub async fn normalize_candidate(
    state: &AppState,
    learner_id: &str,
    candidate: &CandidatePlan,
    minutes: Option<i64>,
    now: DateTime<Utc>,
) -> DailyPlan {
    let request = build_request(state, learner_id, minutes, now).await;
    normalize_with_config(candidate, &request, state.plan_config())
}

/// Stops any timer on the activity, marks it complete and logs its minutes.
pub async fn complete_activity(
    state: &AppState,
    learner_id: &str,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<PlanActivity, ServiceError> {
    let date = now.date_naive();
    // Make sure today's plan exists in the store before completing against it.
    daily_plan(state, learner_id, None, now).await;

    if let Some(summary) = session::stop_if_on(state, learner_id, activity_id).await {
        debug!(
            learner_id = %learner_id,
            activity_id = %activity_id,
            elapsed_secs = summary.elapsed_seconds,
            "Stopped session on completed activity"
        );
    }

    let activity =
        store_complete_activity(state.store(), learner_id, date, activity_id, now).await?;
    state.plan_cache().invalidate(learner_id, date);
    info!(learner_id = %learner_id, activity_id = %activity_id, "Activity completed");
    Ok(activity)
}
