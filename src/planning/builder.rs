//! Deterministic daily plan builder.
//!
//! The session budget is split into vocabulary review, conversation and a
//! remainder. The remainder becomes one or more extra activities chosen to
//! diversify against recent history. All recency comparisons use the
//! request's `now`; identical requests yield identical plans.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::config::PlanConfig;
use super::types::{
    ActivityHistorySummary, ActivityType, DailyPlan, LearningResource, PlanActivity, PlanRequest,
    PlanSource, SkillProfile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSplit {
    pub total: u32,
    pub vocabulary: u32,
    pub conversation: u32,
    pub remaining: u32,
}

pub fn split_budget(total: u32, config: &PlanConfig) -> BudgetSplit {
    let third = total / 3;
    let mut vocabulary = third.clamp(config.vocabulary_min_minutes, config.vocabulary_max_minutes);
    let mut conversation = third.clamp(config.activity_min_minutes, config.activity_max_minutes);
    let mut remaining = total.saturating_sub(vocabulary + conversation);

    if remaining < config.fold_threshold_minutes {
        let room = config.activity_max_minutes.saturating_sub(conversation);
        let into_conversation = remaining.min(room);
        conversation += into_conversation;
        let spill = remaining - into_conversation;
        vocabulary = (vocabulary + spill).min(config.vocabulary_max_minutes);
        remaining = 0;
    }

    BudgetSplit {
        total,
        vocabulary,
        conversation,
        remaining,
    }
}

/// Even split of the remainder into chunks no longer than one activity may run.
pub fn split_remaining(remaining: u32, config: &PlanConfig) -> Vec<u32> {
    if remaining == 0 {
        return Vec::new();
    }
    let max = config.activity_max_minutes.max(1);
    let chunks = remaining.div_ceil(max);
    let base = remaining / chunks;
    let extra = remaining % chunks;
    (0..chunks)
        .map(|i| (base + u32::from(i < extra)).clamp(config.activity_min_minutes, max))
        .collect()
}

#[derive(Debug, Default)]
struct Recency {
    by_type: BTreeMap<ActivityType, DateTime<Utc>>,
    by_resource: BTreeMap<String, DateTime<Utc>>,
    by_skill: BTreeMap<String, DateTime<Utc>>,
}

fn bump<K: Ord>(map: &mut BTreeMap<K, DateTime<Utc>>, key: K, date: DateTime<Utc>) {
    map.entry(key)
        .and_modify(|seen| {
            if date > *seen {
                *seen = date;
            }
        })
        .or_insert(date);
}

impl Recency {
    fn from_history(history: &[ActivityHistorySummary]) -> Self {
        let mut recency = Self::default();
        for item in history {
            bump(&mut recency.by_type, item.activity_type, item.date);
            if let Some(id) = &item.resource_id {
                bump(&mut recency.by_resource, id.clone(), item.date);
            }
            if let Some(id) = &item.skill_id {
                bump(&mut recency.by_skill, id.clone(), item.date);
            }
        }
        recency
    }

    fn skill(&self, id: &str) -> Option<DateTime<Utc>> {
        self.by_skill.get(id).copied()
    }
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    activity_type: ActivityType,
    resource: Option<&'a LearningResource>,
    skill: Option<&'a SkillProfile>,
}

impl Candidate<'_> {
    fn source_id(&self) -> &str {
        match (self.resource, self.skill) {
            (Some(r), _) => &r.id,
            (None, Some(s)) => &s.id,
            (None, None) => "",
        }
    }

    fn source_title(&self) -> &str {
        match (self.resource, self.skill) {
            (Some(r), _) => &r.title,
            (None, Some(s)) => &s.title,
            (None, None) => "",
        }
    }

    fn source_last_seen(&self, recency: &Recency) -> Option<DateTime<Utc>> {
        match (self.resource, self.skill) {
            (Some(r), _) => recency.by_resource.get(&r.id).copied(),
            (None, Some(s)) => recency.skill(&s.id),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Planned {
    types: BTreeSet<ActivityType>,
    sources: BTreeSet<String>,
}

type RankKey = (
    bool,
    bool,
    bool,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    ActivityType,
    String,
);

fn rank_key(
    candidate: &Candidate<'_>,
    recency: &Recency,
    recent_cutoff: DateTime<Utc>,
    planned: &Planned,
) -> RankKey {
    let type_seen = recency.by_type.get(&candidate.activity_type).copied();
    let source_seen = candidate.source_last_seen(recency);
    let recent = type_seen.is_some_and(|d| d >= recent_cutoff)
        || source_seen.is_some_and(|d| d >= recent_cutoff);

    (
        planned.types.contains(&candidate.activity_type),
        planned.sources.contains(candidate.source_id()),
        recent,
        source_seen,
        type_seen,
        candidate.activity_type,
        candidate.source_id().to_string(),
    )
}

fn collect_candidates<'a>(
    resources: &[&'a LearningResource],
    skills: &[&'a SkillProfile],
) -> Vec<Candidate<'a>> {
    let mut candidates = Vec::new();
    for resource in resources {
        for activity_type in resource.media_type.activity_types() {
            if activity_type.needs_word_count() && resource.word_count == 0 {
                continue;
            }
            candidates.push(Candidate {
                activity_type: *activity_type,
                resource: Some(resource),
                skill: None,
            });
        }
    }
    for skill in skills {
        candidates.push(Candidate {
            activity_type: ActivityType::VocabularyGame,
            resource: None,
            skill: Some(skill),
        });
    }
    candidates
}

pub fn build(request: &PlanRequest) -> DailyPlan {
    build_with_config(request, &PlanConfig::default())
}

pub fn build_with_config(request: &PlanRequest, config: &PlanConfig) -> DailyPlan {
    let now = request.now;
    let date = now.date_naive();
    let budget = split_budget(request.session_minutes(config), config);
    let recency = Recency::from_history(&request.recent_history);
    let recent_cutoff = now - Duration::days(config.recency_window_days);

    let resources: Vec<&LearningResource> = request
        .available_resources
        .iter()
        .filter(|r| request.matches_language(&r.language))
        .collect();
    let skills: Vec<&SkillProfile> = request
        .available_skills
        .iter()
        .filter(|s| request.matches_language(&s.language))
        .collect();

    let mut notes = vec![format!(
        "{}-minute session: review {} min, conversation {} min, {} min for other practice",
        budget.total, budget.vocabulary, budget.conversation, budget.remaining
    )];
    let mut planned = Planned::default();
    let mut activities = Vec::new();

    let word_count = config
        .word_allocation(budget.vocabulary)
        .min(request.vocabulary_due_count);
    let mut review = PlanActivity::new(date, 1, ActivityType::VocabularyReview, budget.vocabulary);
    review.vocab_word_count = Some(word_count);
    activities.push(review);
    planned.types.insert(ActivityType::VocabularyReview);
    notes.push(format!(
        "{} words due, reviewing {}",
        request.vocabulary_due_count, word_count
    ));

    let mut conversation =
        PlanActivity::new(date, 2, ActivityType::Conversation, budget.conversation);
    if let Some(skill) = skills
        .iter()
        .min_by_key(|s| (recency.skill(&s.id), s.id.as_str()))
    {
        conversation.skill_id = Some(skill.id.clone());
        planned.sources.insert(skill.id.clone());
        notes.push(format!("conversation practises {}", skill.title));
    }
    activities.push(conversation);
    planned.types.insert(ActivityType::Conversation);

    let mut candidates = collect_candidates(&resources, &skills);
    for minutes in split_remaining(budget.remaining, config) {
        let best = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| rank_key(c, &recency, recent_cutoff, &planned))
            .map(|(index, c)| (index, rank_key(c, &recency, recent_cutoff, &planned).2));
        let Some((index, recent)) = best else {
            notes.push("no matching resources or skills for the remaining minutes".to_string());
            break;
        };
        let candidate = candidates.remove(index);

        let priority = activities.len() as u32 + 1;
        let mut activity = PlanActivity::new(date, priority, candidate.activity_type, minutes);
        activity.resource_id = candidate.resource.map(|r| r.id.clone());
        activity.skill_id = candidate.skill.map(|s| s.id.clone());
        if candidate.activity_type.uses_vocabulary() {
            activity.vocab_word_count = Some(
                config
                    .word_allocation(minutes)
                    .min(request.vocabulary_due_count),
            );
        }

        notes.push(format!(
            "{} on {} ({})",
            candidate.activity_type.as_str(),
            candidate.source_title(),
            if recent {
                "least recently practised"
            } else {
                "not practised recently"
            }
        ));
        planned.types.insert(candidate.activity_type);
        planned.sources.insert(candidate.source_id().to_string());
        activities.push(activity);
    }

    debug!(
        total = budget.total,
        activities = activities.len(),
        due = request.vocabulary_due_count,
        "deterministic plan built"
    );

    DailyPlan {
        date,
        generated_at: now,
        activities,
        rationale: notes.join("; "),
        source: PlanSource::Deterministic,
    }
}
