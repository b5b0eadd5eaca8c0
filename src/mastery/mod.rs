//! Mastery layer - per-word learning state
//!
//! Contains:
//! - VocabularyProgress record and its derived views
//! - Attempt application (streaks, phases, SM-2 scheduling)
//! - Per-learner write serialization

pub mod config;
pub mod locks;
pub mod model;
pub mod updater;

pub use config::MasteryConfig;
pub use locks::LearnerLocks;
pub use model::{
    clamp_mastery, LearningPhase, MasteryStatus, ProgressView, VocabularyProgress,
};
pub use updater::{
    apply_attempt, apply_attempt_with_config, quality_proxy, validate_attempt, Attempt,
    AttemptError, ExerciseKind, InputMode,
};
