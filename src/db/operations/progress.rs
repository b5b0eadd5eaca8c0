use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db::{from_millis, to_count, to_millis, Store, StoreError};
use crate::mastery::{LearningPhase, VocabularyProgress};

pub async fn load_progress(
    store: &Store,
    learner_id: &str,
    vocabulary_id: &str,
) -> Result<Option<VocabularyProgress>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            "learnerId", "vocabularyId", "totalAttempts", "correctAttempts",
            "recognitionAttempts", "recognitionCorrect", "multipleChoiceCorrect",
            "masteryScore", "currentPhase", "currentStreak", "productionInStreak",
            "easeFactor", "reviewInterval", "nextReviewAt", "lastPracticedAt"
        FROM "vocabulary_progress"
        WHERE "learnerId" = ? AND "vocabularyId" = ?
        "#,
    )
    .bind(learner_id)
    .bind(vocabulary_id)
    .fetch_optional(store.pool())
    .await?;

    row.as_ref().map(map_progress_row).transpose()
}

pub async fn save_progress(store: &Store, progress: &VocabularyProgress) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "vocabulary_progress" (
            "learnerId", "vocabularyId", "totalAttempts", "correctAttempts",
            "recognitionAttempts", "recognitionCorrect", "multipleChoiceCorrect",
            "masteryScore", "currentPhase", "currentStreak", "productionInStreak",
            "easeFactor", "reviewInterval", "nextReviewAt", "lastPracticedAt", "updatedAt"
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("learnerId", "vocabularyId") DO UPDATE SET
            "totalAttempts" = excluded."totalAttempts",
            "correctAttempts" = excluded."correctAttempts",
            "recognitionAttempts" = excluded."recognitionAttempts",
            "recognitionCorrect" = excluded."recognitionCorrect",
            "multipleChoiceCorrect" = excluded."multipleChoiceCorrect",
            "masteryScore" = excluded."masteryScore",
            "currentPhase" = excluded."currentPhase",
            "currentStreak" = excluded."currentStreak",
            "productionInStreak" = excluded."productionInStreak",
            "easeFactor" = excluded."easeFactor",
            "reviewInterval" = excluded."reviewInterval",
            "nextReviewAt" = excluded."nextReviewAt",
            "lastPracticedAt" = excluded."lastPracticedAt",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(&progress.learner_id)
    .bind(&progress.vocabulary_id)
    .bind(i64::from(progress.total_attempts))
    .bind(i64::from(progress.correct_attempts))
    .bind(i64::from(progress.recognition_attempts))
    .bind(i64::from(progress.recognition_correct))
    .bind(i64::from(progress.multiple_choice_correct))
    .bind(progress.mastery_score)
    .bind(progress.current_phase.as_str())
    .bind(i64::from(progress.current_streak))
    .bind(i64::from(progress.production_in_streak))
    .bind(progress.ease_factor)
    .bind(i64::from(progress.review_interval))
    .bind(progress.next_review_date.map(to_millis))
    .bind(progress.last_practiced_at.map(to_millis))
    .bind(to_millis(Utc::now()))
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Items whose review date has passed. Rows without a review date are never due.
pub async fn count_due(
    store: &Store,
    learner_id: &str,
    now: DateTime<Utc>,
) -> Result<u32, StoreError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "vocabulary_progress"
        WHERE "learnerId" = ? AND "nextReviewAt" IS NOT NULL AND "nextReviewAt" <= ?
        "#,
    )
    .bind(learner_id)
    .bind(to_millis(now))
    .fetch_one(store.pool())
    .await?;

    Ok(to_count(count))
}

fn map_progress_row(row: &SqliteRow) -> Result<VocabularyProgress, StoreError> {
    let phase: String = row.try_get("currentPhase")?;
    let current_phase = LearningPhase::parse(&phase)
        .ok_or_else(|| StoreError::Serialization(format!("unknown phase {phase}")))?;
    let next_review: Option<i64> = row.try_get("nextReviewAt")?;
    let last_practiced: Option<i64> = row.try_get("lastPracticedAt")?;

    Ok(VocabularyProgress {
        vocabulary_id: row.try_get("vocabularyId")?,
        learner_id: row.try_get("learnerId")?,
        total_attempts: to_count(row.try_get("totalAttempts")?),
        correct_attempts: to_count(row.try_get("correctAttempts")?),
        recognition_attempts: to_count(row.try_get("recognitionAttempts")?),
        recognition_correct: to_count(row.try_get("recognitionCorrect")?),
        multiple_choice_correct: to_count(row.try_get("multipleChoiceCorrect")?),
        mastery_score: row.try_get("masteryScore")?,
        current_phase,
        current_streak: to_count(row.try_get("currentStreak")?),
        production_in_streak: to_count(row.try_get("productionInStreak")?),
        ease_factor: row.try_get("easeFactor")?,
        review_interval: to_count(row.try_get("reviewInterval")?),
        next_review_date: next_review.map(from_millis).transpose()?,
        last_practiced_at: last_practiced.map(from_millis).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_missing_progress_is_none() {
        let store = Store::in_memory().await.unwrap();
        assert!(load_progress(&store, "l1", "w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_preserves_fields() {
        let store = Store::in_memory().await.unwrap();
        let due = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let mut progress = VocabularyProgress::new("l1", "w1");
        progress.total_attempts = 7;
        progress.correct_attempts = 5;
        progress.mastery_score = 0.55;
        progress.current_phase = LearningPhase::Production;
        progress.ease_factor = 2.36;
        progress.review_interval = 6;
        progress.next_review_date = Some(due);

        save_progress(&store, &progress).await.unwrap();
        let loaded = load_progress(&store, "l1", "w1").await.unwrap().unwrap();
        assert_eq!(loaded, progress);

        progress.total_attempts = 8;
        progress.next_review_date = None;
        save_progress(&store, &progress).await.unwrap();
        let loaded = load_progress(&store, "l1", "w1").await.unwrap().unwrap();
        assert_eq!(loaded.total_attempts, 8);
        assert!(loaded.next_review_date.is_none());
    }

    #[tokio::test]
    async fn test_count_due() {
        let store = Store::in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();

        for (word, due) in [
            ("past", Some(now - Duration::days(1))),
            ("exact", Some(now)),
            ("future", Some(now + Duration::days(1))),
            ("never", None),
        ] {
            let mut progress = VocabularyProgress::new("l1", word);
            progress.next_review_date = due;
            save_progress(&store, &progress).await.unwrap();
        }
        let mut other = VocabularyProgress::new("l2", "past");
        other.next_review_date = Some(now - Duration::days(3));
        save_progress(&store, &other).await.unwrap();

        assert_eq!(count_due(&store, "l1", now).await.unwrap(), 2);
        assert_eq!(count_due(&store, "nobody", now).await.unwrap(), 0);
    }
}
