//! Per-learner, per-word mastery record and its derived read-only views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_REVIEW_INTERVAL: u32 = 1;

pub const KNOWN_MASTERY_THRESHOLD: f64 = 0.85;
pub const KNOWN_PRODUCTION_STREAK: u32 = 2;
pub const STATUS_KNOWN_THRESHOLD: f64 = 0.8;
pub const TEXT_ENTRY_THRESHOLD: f64 = 0.50;
pub const MULTIPLE_CHOICE_CONFIDENCE: u32 = 3;

/// Learning phases only ever move forward: Recognition < Production < Application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LearningPhase {
    Recognition,
    Production,
    Application,
}

impl LearningPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recognition => "Recognition",
            Self::Production => "Production",
            Self::Application => "Application",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Recognition" => Some(Self::Recognition),
            "Production" => Some(Self::Production),
            "Application" => Some(Self::Application),
            _ => None,
        }
    }

    /// Returns the later of the two phases.
    pub fn advance_to(self, target: LearningPhase) -> LearningPhase {
        self.max(target)
    }
}

/// Coarse UI-facing view. Deliberately looser than [`VocabularyProgress::is_known`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasteryStatus {
    Unknown,
    Learning,
    Known,
}

/// Single clamp path for every mastery mutation. Non-finite input collapses to 0.
pub fn clamp_mastery(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyProgress {
    pub vocabulary_id: String,
    pub learner_id: String,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub recognition_attempts: u32,
    pub recognition_correct: u32,
    pub multiple_choice_correct: u32,
    pub mastery_score: f64,
    pub current_phase: LearningPhase,
    pub current_streak: u32,
    pub production_in_streak: u32,
    pub ease_factor: f64,
    pub review_interval: u32,
    pub next_review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
}

impl VocabularyProgress {
    pub fn new(learner_id: impl Into<String>, vocabulary_id: impl Into<String>) -> Self {
        Self {
            vocabulary_id: vocabulary_id.into(),
            learner_id: learner_id.into(),
            total_attempts: 0,
            correct_attempts: 0,
            recognition_attempts: 0,
            recognition_correct: 0,
            multiple_choice_correct: 0,
            mastery_score: 0.0,
            current_phase: LearningPhase::Recognition,
            current_streak: 0,
            production_in_streak: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            review_interval: DEFAULT_REVIEW_INTERVAL,
            next_review_date: None,
            last_practiced_at: None,
        }
    }

    pub fn set_mastery_score(&mut self, score: f64) {
        self.mastery_score = clamp_mastery(score);
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct_attempts, self.total_attempts)
    }

    pub fn recognition_accuracy(&self) -> f64 {
        ratio(self.recognition_correct, self.recognition_attempts)
    }

    /// Recognition streak plus half weight for each production rep inside it.
    pub fn effective_streak(&self) -> f64 {
        self.current_streak as f64 + self.production_in_streak as f64 * 0.5
    }

    /// Requires both high mastery and two correct production attempts in the current streak.
    pub fn is_known(&self) -> bool {
        self.mastery_score >= KNOWN_MASTERY_THRESHOLD
            && self.production_in_streak >= KNOWN_PRODUCTION_STREAK
    }

    pub fn status(&self) -> MasteryStatus {
        if self.mastery_score <= 0.0 {
            MasteryStatus::Unknown
        } else if self.mastery_score < STATUS_KNOWN_THRESHOLD {
            MasteryStatus::Learning
        } else {
            MasteryStatus::Known
        }
    }

    pub fn has_confidence_in_multiple_choice(&self) -> bool {
        self.multiple_choice_correct >= MULTIPLE_CHOICE_CONFIDENCE
    }

    pub fn multiple_choice_progress(&self) -> f64 {
        (self.multiple_choice_correct as f64 / MULTIPLE_CHOICE_CONFIDENCE as f64).min(1.0)
    }

    /// A missing review date is never due.
    pub fn is_due_for_review(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date.is_some_and(|due| due <= now)
    }

    pub fn ready_for_text_entry(&self) -> bool {
        self.mastery_score >= TEXT_ENTRY_THRESHOLD
    }

    pub fn view(&self, now: DateTime<Utc>) -> ProgressView {
        ProgressView {
            progress: self.clone(),
            accuracy: self.accuracy(),
            recognition_accuracy: self.recognition_accuracy(),
            effective_streak: self.effective_streak(),
            status: self.status(),
            is_known: self.is_known(),
            is_due_for_review: self.is_due_for_review(now),
            ready_for_text_entry: self.ready_for_text_entry(),
            has_confidence_in_multiple_choice: self.has_confidence_in_multiple_choice(),
            multiple_choice_progress: self.multiple_choice_progress(),
        }
    }
}

/// Stored fields plus every derived property, for JSON consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: VocabularyProgress,
    pub accuracy: f64,
    pub recognition_accuracy: f64,
    pub effective_streak: f64,
    pub status: MasteryStatus,
    pub is_known: bool,
    pub is_due_for_review: bool,
    pub ready_for_text_entry: bool,
    pub has_confidence_in_multiple_choice: bool,
    pub multiple_choice_progress: f64,
}
