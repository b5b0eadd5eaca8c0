//! Applies one learning attempt to a [`VocabularyProgress`] record.
//!
//! Streak and phase bookkeeping follow the recognition/production axis only;
//! the exercise kind is consulted for consistency checks and the
//! multiple-choice confidence counter. Scheduling is an SM-2 style ease and
//! interval update driven by a 1..=5 quality proxy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::config::MasteryConfig;
use super::model::{clamp_mastery, LearningPhase, VocabularyProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    Recognition,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseKind {
    MultipleChoice,
    TextEntry,
    Flashcard,
    Listening,
}

impl ExerciseKind {
    fn allows(&self, mode: InputMode) -> bool {
        match self {
            Self::TextEntry => mode == InputMode::Production,
            Self::Flashcard => mode == InputMode::Recognition,
            Self::MultipleChoice | Self::Listening => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub was_correct: bool,
    pub input_mode: InputMode,
    #[serde(default)]
    pub exercise_kind: Option<ExerciseKind>,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
    #[serde(default)]
    pub difficulty_weight: Option<f64>,
    #[serde(default)]
    pub user_confidence: Option<f64>,
}

impl Attempt {
    pub fn new(was_correct: bool, input_mode: InputMode) -> Self {
        Self {
            was_correct,
            input_mode,
            exercise_kind: None,
            response_time_ms: None,
            difficulty_weight: None,
            user_confidence: None,
        }
    }

    pub fn correct(input_mode: InputMode) -> Self {
        Self::new(true, input_mode)
    }

    pub fn incorrect(input_mode: InputMode) -> Self {
        Self::new(false, input_mode)
    }

    pub fn with_kind(mut self, kind: ExerciseKind) -> Self {
        self.exercise_kind = Some(kind);
        self
    }

    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_difficulty(mut self, weight: f64) -> Self {
        self.difficulty_weight = Some(weight);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.user_confidence = Some(confidence);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttemptError {
    #[error("invalid attempt: {0}")]
    InvalidAttempt(String),
}

/// Rejects malformed input. Out-of-range difficulty weights are clamped later, not rejected.
pub fn validate_attempt(attempt: &Attempt) -> Result<(), AttemptError> {
    if let Some(kind) = attempt.exercise_kind {
        if !kind.allows(attempt.input_mode) {
            return Err(AttemptError::InvalidAttempt(format!(
                "{kind:?} cannot be answered in {:?} mode",
                attempt.input_mode
            )));
        }
    }
    if let Some(weight) = attempt.difficulty_weight {
        if !weight.is_finite() {
            return Err(AttemptError::InvalidAttempt(
                "difficultyWeight must be finite".to_string(),
            ));
        }
    }
    if let Some(ms) = attempt.response_time_ms {
        if ms < 0 {
            return Err(AttemptError::InvalidAttempt(
                "responseTimeMs must not be negative".to_string(),
            ));
        }
    }
    if let Some(confidence) = attempt.user_confidence {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(AttemptError::InvalidAttempt(
                "userConfidence must be within [0, 1]".to_string(),
            ));
        }
    }
    Ok(())
}

/// SM-2 quality in 1..=5. Incorrect answers always score 1.
pub fn quality_proxy(attempt: &Attempt, config: &MasteryConfig) -> u8 {
    if !attempt.was_correct {
        return 1;
    }

    let fast = attempt
        .response_time_ms
        .is_some_and(|ms| ms < config.fast_response_ms);
    let slow = attempt
        .response_time_ms
        .is_some_and(|ms| ms > config.slow_response_ms);
    let confident = attempt
        .user_confidence
        .map_or(true, |c| c >= config.confident_threshold);
    let unsure = attempt
        .user_confidence
        .is_some_and(|c| c < config.unsure_threshold);

    if fast && confident {
        5
    } else if slow || unsure {
        3
    } else {
        4
    }
}

pub fn next_ease_factor(ease: f64, quality: u8, config: &MasteryConfig) -> f64 {
    let miss = 5.0 - quality.min(5) as f64;
    (ease + 0.1 - miss * (0.08 + miss * 0.02)).max(config.ease_floor)
}

pub fn apply_attempt(
    progress: &VocabularyProgress,
    attempt: &Attempt,
    now: DateTime<Utc>,
) -> Result<VocabularyProgress, AttemptError> {
    apply_attempt_with_config(progress, attempt, now, &MasteryConfig::default())
}

pub fn apply_attempt_with_config(
    progress: &VocabularyProgress,
    attempt: &Attempt,
    now: DateTime<Utc>,
    config: &MasteryConfig,
) -> Result<VocabularyProgress, AttemptError> {
    validate_attempt(attempt)?;

    let mut next = progress.clone();
    let correct = attempt.was_correct;

    next.total_attempts = next.total_attempts.saturating_add(1);
    if correct {
        next.correct_attempts = next.correct_attempts.saturating_add(1);
    }

    match attempt.input_mode {
        InputMode::Recognition => {
            next.recognition_attempts = next.recognition_attempts.saturating_add(1);
            if correct {
                next.recognition_correct = next.recognition_correct.saturating_add(1);
            }
        }
        InputMode::Production => {
            if correct && attempt.exercise_kind == Some(ExerciseKind::MultipleChoice) {
                next.multiple_choice_correct = next.multiple_choice_correct.saturating_add(1);
            }
        }
    }

    if correct {
        next.current_streak = next.current_streak.saturating_add(1);
        if attempt.input_mode == InputMode::Production {
            next.production_in_streak = next.production_in_streak.saturating_add(1);
        }
        let weight = config.clamp_weight(attempt.difficulty_weight.unwrap_or(1.0));
        next.set_mastery_score(next.mastery_score + config.correct_increment * weight);
        next.current_phase = next_phase(&next, config);
    } else {
        next.current_streak = 0;
        next.production_in_streak = 0;
        next.set_mastery_score(next.mastery_score - config.incorrect_decrement);
    }

    let quality = quality_proxy(attempt, config);
    if correct {
        next.ease_factor = next_ease_factor(next.ease_factor, quality, config);
        let scaled = (next.review_interval.max(1) as f64 * next.ease_factor).round();
        next.review_interval = (scaled as u32).clamp(1, config.max_review_interval_days.max(1));
    } else {
        next.ease_factor =
            (next.ease_factor - config.incorrect_ease_penalty).max(config.ease_floor);
        next.review_interval = 1;
    }

    next.next_review_date = now.checked_add_signed(Duration::days(next.review_interval as i64));
    next.last_practiced_at = Some(now);

    debug!(
        vocabulary_id = %next.vocabulary_id,
        correct,
        quality,
        mastery = next.mastery_score,
        phase = next.current_phase.as_str(),
        interval = next.review_interval,
        "attempt applied"
    );

    Ok(next)
}

fn next_phase(progress: &VocabularyProgress, config: &MasteryConfig) -> LearningPhase {
    let mut phase = progress.current_phase;
    let mastery = clamp_mastery(progress.mastery_score);

    if phase == LearningPhase::Recognition
        && progress.current_streak >= config.production_phase_streak
        && mastery >= config.production_phase_min_mastery
    {
        phase = phase.advance_to(LearningPhase::Production);
    }
    if phase == LearningPhase::Production
        && mastery >= config.application_phase_min_mastery
        && progress.production_in_streak >= config.application_phase_production
    {
        phase = phase.advance_to(LearningPhase::Application);
    }
    phase
}
