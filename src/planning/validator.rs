//! Normalization of externally generated candidate plans.
//!
//! A candidate from the plan suggester is never trusted as-is. Unknown
//! sources are dropped, minutes and word counts are clamped, priorities and
//! ids are rewritten. When nothing usable survives, or the total drifts too far
//! from the learner's budget, the deterministic builder takes over.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::builder::build_with_config;
use super::config::PlanConfig;
use super::types::{ActivityType, DailyPlan, PlanActivity, PlanRequest, PlanSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePlan {
    #[serde(default)]
    pub activities: Vec<CandidateActivity>,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateActivity {
    pub activity_type: ActivityType,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub estimated_minutes: i64,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub vocab_word_count: Option<i64>,
}

impl CandidateActivity {
    pub fn new(activity_type: ActivityType, estimated_minutes: i64) -> Self {
        Self {
            activity_type,
            resource_id: None,
            skill_id: None,
            estimated_minutes,
            priority: None,
            vocab_word_count: None,
        }
    }
}

pub fn normalize(candidate: &CandidatePlan, request: &PlanRequest) -> DailyPlan {
    normalize_with_config(candidate, request, &PlanConfig::default())
}

pub fn normalize_with_config(
    candidate: &CandidatePlan,
    request: &PlanRequest,
    config: &PlanConfig,
) -> DailyPlan {
    let budget = request.session_minutes(config);

    let mut kept: Vec<&CandidateActivity> = candidate
        .activities
        .iter()
        .filter(|a| {
            let resource_ok = a
                .resource_id
                .as_deref()
                .map_or(true, |id| request.has_resource(id));
            let skill_ok = a
                .skill_id
                .as_deref()
                .map_or(true, |id| request.has_skill(id));
            if !(resource_ok && skill_ok) {
                debug!(
                    activity_type = a.activity_type.as_str(),
                    resource_id = ?a.resource_id,
                    skill_id = ?a.skill_id,
                    "dropping candidate activity with unknown source"
                );
            }
            resource_ok && skill_ok
        })
        .collect();

    let dropped = candidate.activities.len() - kept.len();
    if kept.is_empty() {
        return fallback(request, config, "suggested plan had no usable activities");
    }

    // Stable: missing priorities go last, ties keep their original order.
    kept.sort_by_key(|a| a.priority.unwrap_or(i64::MAX));

    let date = request.now.date_naive();
    let activities: Vec<PlanActivity> = kept
        .into_iter()
        .enumerate()
        .map(|(index, a)| {
            let priority = index as u32 + 1;
            let minutes = a.activity_type.clamp_minutes(a.estimated_minutes, config);
            let mut activity = PlanActivity::new(date, priority, a.activity_type, minutes);
            activity.resource_id = a.resource_id.clone();
            activity.skill_id = a.skill_id.clone();
            activity.vocab_word_count = vocab_word_count(a, request, config);
            activity
        })
        .collect();

    let total: u32 = activities.iter().map(|a| a.estimated_minutes).sum();
    if total.abs_diff(budget) > config.budget_tolerance_minutes {
        return fallback(
            request,
            config,
            &format!("suggested plan totals {total} minutes against a {budget}-minute budget"),
        );
    }

    let mut rationale = candidate
        .rationale
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("generated plan")
        .to_string();
    if dropped > 0 {
        rationale.push_str(&format!("; {dropped} activities with unknown sources removed"));
    }

    DailyPlan {
        date,
        generated_at: request.now,
        activities,
        rationale,
        source: PlanSource::Generated,
    }
}

fn vocab_word_count(
    activity: &CandidateActivity,
    request: &PlanRequest,
    config: &PlanConfig,
) -> Option<u32> {
    let clamp = |n: i64| {
        n.clamp(config.min_review_words as i64, config.max_review_words as i64) as u32
    };
    match activity.activity_type {
        ActivityType::VocabularyReview => {
            let requested = activity
                .vocab_word_count
                .unwrap_or(config.min_review_words as i64);
            Some(clamp(requested).min(request.vocabulary_due_count))
        }
        ActivityType::VocabularyGame => Some(clamp(
            activity
                .vocab_word_count
                .unwrap_or(config.min_review_words as i64),
        )),
        _ => None,
    }
}

fn fallback(request: &PlanRequest, config: &PlanConfig, reason: &str) -> DailyPlan {
    warn!(reason, "falling back to deterministic plan");
    let mut plan = build_with_config(request, config);
    plan.rationale = format!("{}; fallback: {}", plan.rationale, reason);
    plan
}
