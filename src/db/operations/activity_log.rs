use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::db::{from_millis, to_count, to_millis, Store, StoreError};
use crate::planning::{ActivityLogEntry, ActivityType};

pub async fn record_activity(
    store: &Store,
    learner_id: &str,
    entry: &ActivityLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "activity_log"
            ("learnerId", "occurredAt", "activityType", "resourceId", "skillId", "title",
             "minutesSpent")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(entry.date))
    .bind(entry.activity_type.as_str())
    .bind(entry.resource_id.as_deref())
    .bind(entry.skill_id.as_deref())
    .bind(entry.title.as_deref())
    .bind(i64::from(entry.minutes_spent))
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Raw log rows at or after `since`, newest first.
pub async fn activity_log_since(
    store: &Store,
    learner_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<ActivityLogEntry>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT "occurredAt", "activityType", "resourceId", "skillId", "title", "minutesSpent"
        FROM "activity_log"
        WHERE "learnerId" = ? AND "occurredAt" >= ?
        ORDER BY "occurredAt" DESC, "id" DESC
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(since))
    .fetch_all(store.pool())
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let activity_type: String = row.try_get("activityType")?;
        let Some(activity_type) = ActivityType::parse(&activity_type) else {
            tracing::warn!(
                activity_type = %activity_type,
                "Skipping log row with unknown activity type"
            );
            continue;
        };
        out.push(ActivityLogEntry {
            date: from_millis(row.try_get("occurredAt")?)?,
            activity_type,
            resource_id: row.try_get("resourceId")?,
            skill_id: row.try_get("skillId")?,
            title: row.try_get("title")?,
            minutes_spent: to_count(row.try_get("minutesSpent")?),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_log_filtered_by_learner_and_date() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();

        for (learner, days_ago, t) in [
            ("l1", 1, ActivityType::Reading),
            ("l1", 20, ActivityType::Cloze),
            ("l2", 1, ActivityType::Listening),
            ("l1", 0, ActivityType::Conversation),
        ] {
            let entry = ActivityLogEntry {
                date: now - Duration::days(days_ago),
                activity_type: t,
                resource_id: Some("r1".to_string()),
                skill_id: None,
                title: None,
                minutes_spent: 9,
            };
            record_activity(&store, learner, &entry).await.unwrap();
        }

        let log = activity_log_since(&store, "l1", now - Duration::days(14))
            .await
            .unwrap();
        let types: Vec<_> = log.iter().map(|e| e.activity_type).collect();
        assert_eq!(types, vec![ActivityType::Conversation, ActivityType::Reading]);
        assert_eq!(log[1].minutes_spent, 9);
        assert_eq!(log[1].resource_id.as_deref(), Some("r1"));
    }
}
