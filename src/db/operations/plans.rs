use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use crate::db::{from_millis, to_count, to_millis, Store, StoreError};
use crate::planning::{DailyPlan, PlanActivity, PlanSource};
use crate::session::{ActivityRef, ProgressSink};

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Stored plan for the learner's day with per-activity progress merged in.
pub async fn load_plan(
    store: &Store,
    learner_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyPlan>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT "generatedAt", "source", "rationale", "activities"
        FROM "daily_plans"
        WHERE "learnerId" = ? AND "planDate" = ?
        "#,
    )
    .bind(learner_id)
    .bind(date_key(date))
    .fetch_optional(store.pool())
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let activities_json: String = row.try_get("activities")?;
    let mut activities: Vec<PlanActivity> = serde_json::from_str(&activities_json)?;

    let progress_rows = sqlx::query(
        r#"
        SELECT "activityId", "minutesSpent", "isCompleted"
        FROM "plan_activity_progress"
        WHERE "learnerId" = ? AND "planDate" = ?
        "#,
    )
    .bind(learner_id)
    .bind(date_key(date))
    .fetch_all(store.pool())
    .await?;

    for progress in progress_rows {
        let activity_id: String = progress.try_get("activityId")?;
        if let Some(activity) = activities.iter_mut().find(|a| a.id == activity_id) {
            activity.minutes_spent = to_count(progress.try_get("minutesSpent")?);
            activity.is_completed = progress.try_get::<i64, _>("isCompleted")? != 0;
        }
    }

    let source: String = row.try_get("source")?;
    Ok(Some(DailyPlan {
        date,
        generated_at: from_millis(row.try_get("generatedAt")?)?,
        activities,
        rationale: row.try_get("rationale")?,
        source: PlanSource::parse(&source),
    }))
}

pub async fn save_plan(
    store: &Store,
    learner_id: &str,
    plan: &DailyPlan,
) -> Result<(), StoreError> {
    let activities = serde_json::to_string(&plan.activities)?;

    sqlx::query(
        r#"
        INSERT INTO "daily_plans"
            ("learnerId", "planDate", "generatedAt", "source", "rationale", "activities")
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT ("learnerId", "planDate") DO UPDATE SET
            "generatedAt" = excluded."generatedAt",
            "source" = excluded."source",
            "rationale" = excluded."rationale",
            "activities" = excluded."activities"
        "#,
    )
    .bind(learner_id)
    .bind(date_key(plan.date))
    .bind(to_millis(plan.generated_at))
    .bind(plan.source.as_str())
    .bind(&plan.rationale)
    .bind(activities)
    .execute(store.pool())
    .await?;

    Ok(())
}

pub async fn record_activity_minutes(
    store: &Store,
    activity: &ActivityRef,
    minutes: u32,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "plan_activity_progress"
            ("learnerId", "planDate", "activityId", "minutesSpent", "isCompleted", "updatedAt")
        VALUES (?, ?, ?, ?, 0, ?)
        ON CONFLICT ("learnerId", "planDate", "activityId") DO UPDATE SET
            "minutesSpent" = "plan_activity_progress"."minutesSpent" + excluded."minutesSpent",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(&activity.learner_id)
    .bind(date_key(activity.plan_date))
    .bind(&activity.activity_id)
    .bind(i64::from(minutes))
    .bind(to_millis(Utc::now()))
    .execute(store.pool())
    .await?;

    Ok(())
}

pub async fn activity_minutes(store: &Store, activity: &ActivityRef) -> Result<u32, StoreError> {
    let minutes: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT "minutesSpent" FROM "plan_activity_progress"
        WHERE "learnerId" = ? AND "planDate" = ? AND "activityId" = ?
        "#,
    )
    .bind(&activity.learner_id)
    .bind(date_key(activity.plan_date))
    .bind(&activity.activity_id)
    .fetch_optional(store.pool())
    .await?;

    Ok(minutes.map(to_count).unwrap_or(0))
}

/// Marks the activity complete and appends its minutes to the activity log.
/// Completing an already completed activity changes nothing.
pub async fn complete_activity(
    store: &Store,
    learner_id: &str,
    date: NaiveDate,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<PlanActivity, StoreError> {
    let plan = load_plan(store, learner_id, date)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("plan for {}", date_key(date))))?;
    let mut activity = plan
        .activity(activity_id)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("activity {activity_id}")))?;

    if activity.is_completed {
        return Ok(activity);
    }

    let mut tx = store.pool().begin().await?;

    sqlx::query(
        r#"
        INSERT INTO "plan_activity_progress"
            ("learnerId", "planDate", "activityId", "minutesSpent", "isCompleted", "updatedAt")
        VALUES (?, ?, ?, 0, 0, ?)
        ON CONFLICT ("learnerId", "planDate", "activityId") DO NOTHING
        "#,
    )
    .bind(learner_id)
    .bind(date_key(date))
    .bind(activity_id)
    .bind(to_millis(now))
    .execute(&mut *tx)
    .await?;

    // Only the caller that flips the flag writes the log row.
    let marked = sqlx::query(
        r#"
        UPDATE "plan_activity_progress"
        SET "isCompleted" = 1, "updatedAt" = ?
        WHERE "learnerId" = ? AND "planDate" = ? AND "activityId" = ? AND "isCompleted" = 0
        "#,
    )
    .bind(to_millis(now))
    .bind(learner_id)
    .bind(date_key(date))
    .bind(activity_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let minutes_spent: i64 = sqlx::query_scalar(
        r#"
        SELECT "minutesSpent" FROM "plan_activity_progress"
        WHERE "learnerId" = ? AND "planDate" = ? AND "activityId" = ?
        "#,
    )
    .bind(learner_id)
    .bind(date_key(date))
    .bind(activity_id)
    .fetch_one(&mut *tx)
    .await?;
    activity.minutes_spent = to_count(minutes_spent);
    activity.is_completed = true;

    if marked == 0 {
        tx.rollback().await?;
        return Ok(activity);
    }

    sqlx::query(
        r#"
        INSERT INTO "activity_log"
            ("learnerId", "occurredAt", "activityType", "resourceId", "skillId", "title",
             "minutesSpent")
        VALUES (
            ?, ?, ?, ?, ?,
            COALESCE(
                (SELECT "title" FROM "learning_resources" WHERE "id" = ?),
                (SELECT "title" FROM "learning_skills" WHERE "id" = ?)
            ),
            ?
        )
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(now))
    .bind(activity.activity_type.as_str())
    .bind(activity.resource_id.as_deref())
    .bind(activity.skill_id.as_deref())
    .bind(activity.resource_id.as_deref())
    .bind(activity.skill_id.as_deref())
    .bind(minutes_spent)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(activity)
}

impl ProgressSink for Store {
    type Error = StoreError;

    async fn load_minutes(&self, activity: &ActivityRef) -> Result<u32, StoreError> {
        activity_minutes(self, activity).await
    }

    async fn add_minutes(&self, activity: &ActivityRef, minutes: u32) -> Result<(), StoreError> {
        record_activity_minutes(self, activity, minutes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::operations::{activity_log_since, upsert_resource};
    use crate::planning::{ActivityType, LearningResource, MediaType};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 10, 0, 0).unwrap()
    }

    fn plan() -> DailyPlan {
        let date = now().date_naive();
        let mut review = PlanActivity::new(date, 1, ActivityType::VocabularyReview, 8);
        review.vocab_word_count = Some(16);
        let mut reading = PlanActivity::new(date, 2, ActivityType::Reading, 10);
        reading.resource_id = Some("r1".to_string());
        DailyPlan {
            date,
            generated_at: now(),
            activities: vec![review, reading],
            rationale: "test plan".to_string(),
            source: PlanSource::Generated,
        }
    }

    fn activity_ref(id: &str) -> ActivityRef {
        ActivityRef {
            learner_id: "l1".to_string(),
            plan_date: now().date_naive(),
            activity_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_plan_round_trip() {
        let store = Store::in_memory().await.unwrap();
        assert!(load_plan(&store, "l1", now().date_naive()).await.unwrap().is_none());

        save_plan(&store, "l1", &plan()).await.unwrap();
        let loaded = load_plan(&store, "l1", now().date_naive()).await.unwrap().unwrap();
        assert_eq!(loaded, plan());
        assert!(load_plan(&store, "l2", now().date_naive()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_minutes_accumulate_and_merge_into_plan() {
        let store = Store::in_memory().await.unwrap();
        save_plan(&store, "l1", &plan()).await.unwrap();

        let reading = activity_ref("2024-09-15-2");
        assert_eq!(activity_minutes(&store, &reading).await.unwrap(), 0);
        store.add_minutes(&reading, 2).await.unwrap();
        store.add_minutes(&reading, 3).await.unwrap();
        assert_eq!(store.load_minutes(&reading).await.unwrap(), 5);

        let loaded = load_plan(&store, "l1", now().date_naive()).await.unwrap().unwrap();
        assert_eq!(loaded.activities[1].minutes_spent, 5);
        assert_eq!(loaded.activities[0].minutes_spent, 0);
    }

    #[tokio::test]
    async fn test_complete_activity_logs_once() {
        let store = Store::in_memory().await.unwrap();
        upsert_resource(
            &store,
            &LearningResource {
                id: "r1".to_string(),
                title: "Morning news".to_string(),
                media_type: MediaType::Text,
                language: "es".to_string(),
                word_count: 400,
            },
        )
        .await
        .unwrap();
        save_plan(&store, "l1", &plan()).await.unwrap();
        record_activity_minutes(&store, &activity_ref("2024-09-15-2"), 7)
            .await
            .unwrap();

        let done = complete_activity(&store, "l1", now().date_naive(), "2024-09-15-2", now())
            .await
            .unwrap();
        assert!(done.is_completed);
        assert_eq!(done.minutes_spent, 7);

        complete_activity(&store, "l1", now().date_naive(), "2024-09-15-2", now())
            .await
            .unwrap();

        let log = activity_log_since(&store, "l1", now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].activity_type, ActivityType::Reading);
        assert_eq!(log[0].minutes_spent, 7);
        assert_eq!(log[0].title.as_deref(), Some("Morning news"));

        let loaded = load_plan(&store, "l1", now().date_naive()).await.unwrap().unwrap();
        assert!(loaded.activities[1].is_completed);
        assert_eq!(loaded.activities[1].minutes_spent, 7);
    }

    #[tokio::test]
    async fn test_concurrent_completion_logs_once() {
        let store = Store::in_memory().await.unwrap();
        save_plan(&store, "l1", &plan()).await.unwrap();
        record_activity_minutes(&store, &activity_ref("2024-09-15-1"), 4)
            .await
            .unwrap();

        let date = now().date_naive();
        let (first, second) = tokio::join!(
            complete_activity(&store, "l1", date, "2024-09-15-1", now()),
            complete_activity(&store, "l1", date, "2024-09-15-1", now()),
        );
        assert!(first.unwrap().is_completed);
        assert!(second.unwrap().is_completed);

        let log = activity_log_since(&store, "l1", now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].minutes_spent, 4);
    }

    #[tokio::test]
    async fn test_complete_unknown_activity_not_found() {
        let store = Store::in_memory().await.unwrap();
        let err = complete_activity(&store, "l1", now().date_naive(), "x", now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        save_plan(&store, "l1", &plan()).await.unwrap();
        let err = complete_activity(&store, "l1", now().date_naive(), "x", now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
