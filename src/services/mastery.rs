use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::db::operations::{count_due, load_progress, save_progress};
use crate::mastery::{apply_attempt_with_config, Attempt, VocabularyProgress};
use crate::services::ServiceError;
use crate::state::AppState;

/// Applies one attempt under the learner's write lock. A rejected attempt
/// leaves stored state untouched.
pub async fn record_attempt(
    state: &AppState,
    learner_id: &str,
    vocabulary_id: &str,
    attempt: &Attempt,
    now: DateTime<Utc>,
) -> Result<VocabularyProgress, ServiceError> {
    let _guard = state.locks().lock(learner_id).await;

    let current = load_progress(state.store(), learner_id, vocabulary_id)
        .await?
        .unwrap_or_else(|| VocabularyProgress::new(learner_id, vocabulary_id));

    let updated = apply_attempt_with_config(&current, attempt, now, state.mastery_config())
        .map_err(|e| {
            warn!(
                learner_id = %learner_id,
                vocabulary_id = %vocabulary_id,
                error = %e,
                "Attempt rejected"
            );
            e
        })?;

    if let Err(e) = save_progress(state.store(), &updated).await {
        warn!(
            learner_id = %learner_id,
            vocabulary_id = %vocabulary_id,
            error = %e,
            "Failed to persist progress"
        );
        return Err(ServiceError::Persistence {
            source: e,
            progress: Some(Box::new(updated)),
        });
    }

    debug!(
        learner_id = %learner_id,
        vocabulary_id = %vocabulary_id,
        mastery = updated.mastery_score,
        phase = updated.current_phase.as_str(),
        "Attempt recorded"
    );
    Ok(updated)
}

/// Writes an already computed record, for retrying after a persistence failure.
pub async fn persist_progress(
    state: &AppState,
    progress: &VocabularyProgress,
) -> Result<(), ServiceError> {
    let _guard = state.locks().lock(&progress.learner_id).await;
    save_progress(state.store(), progress).await?;
    Ok(())
}

/// Stored progress, or a fresh record for a word never practised.
pub async fn get_progress(
    state: &AppState,
    learner_id: &str,
    vocabulary_id: &str,
) -> Result<VocabularyProgress, ServiceError> {
    Ok(load_progress(state.store(), learner_id, vocabulary_id)
        .await?
        .unwrap_or_else(|| VocabularyProgress::new(learner_id, vocabulary_id)))
}

pub async fn due_count(
    state: &AppState,
    learner_id: &str,
    now: DateTime<Utc>,
) -> Result<u32, ServiceError> {
    Ok(count_due(state.store(), learner_id, now).await?)
}
