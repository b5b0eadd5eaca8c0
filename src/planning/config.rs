use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub min_session_minutes: u32,
    pub max_session_minutes: u32,
    pub default_session_minutes: u32,
    pub vocabulary_min_minutes: u32,
    pub vocabulary_max_minutes: u32,
    pub activity_min_minutes: u32,
    pub activity_max_minutes: u32,
    pub words_per_minute: u32,
    pub min_review_words: u32,
    pub max_review_words: u32,
    /// Leftover below this is folded into conversation instead of becoming its own activity.
    pub fold_threshold_minutes: u32,
    pub recency_window_days: i64,
    pub history_window_days: i64,
    pub budget_tolerance_minutes: u32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            min_session_minutes: 10,
            max_session_minutes: 90,
            default_session_minutes: 20,
            vocabulary_min_minutes: 6,
            vocabulary_max_minutes: 12,
            activity_min_minutes: 5,
            activity_max_minutes: 15,
            words_per_minute: 2,
            min_review_words: 8,
            max_review_words: 24,
            fold_threshold_minutes: 10,
            recency_window_days: 2,
            history_window_days: 14,
            budget_tolerance_minutes: 5,
        }
    }
}

impl PlanConfig {
    pub fn word_allocation(&self, minutes: u32) -> u32 {
        (minutes * self.words_per_minute).clamp(self.min_review_words, self.max_review_words)
    }
}
