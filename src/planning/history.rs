use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::types::{ActivityHistorySummary, ActivityLogEntry, ActivityType};

pub const DEFAULT_WINDOW_DAYS: i64 = 14;

type GroupKey = (ActivityType, Option<String>, Option<String>);

/// Collapses the trailing `window_days` of the raw log into one summary per
/// (type, resource, skill), newest group first.
pub fn digest(
    log: &[ActivityLogEntry],
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<ActivityHistorySummary> {
    let since = now - Duration::days(window_days.max(0));
    let mut groups: BTreeMap<GroupKey, ActivityHistorySummary> = BTreeMap::new();

    for entry in log.iter().filter(|e| e.date >= since && e.date <= now) {
        let key = (
            entry.activity_type,
            entry.resource_id.clone(),
            entry.skill_id.clone(),
        );
        let summary = groups.entry(key).or_insert_with(|| ActivityHistorySummary {
            date: entry.date,
            activity_type: entry.activity_type,
            resource_id: entry.resource_id.clone(),
            skill_id: entry.skill_id.clone(),
            title: None,
            minutes_spent: 0,
            sessions: 0,
        });

        summary.minutes_spent = summary.minutes_spent.saturating_add(entry.minutes_spent);
        summary.sessions += 1;
        if entry.date >= summary.date {
            summary.date = entry.date;
            if entry.title.is_some() {
                summary.title = entry.title.clone();
            }
        } else if summary.title.is_none() {
            summary.title = entry.title.clone();
        }
    }

    let mut summaries: Vec<_> = groups.into_values().collect();
    // Stable sort keeps key order for equal dates.
    summaries.sort_by(|a, b| b.date.cmp(&a.date));
    summaries
}
