use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    pub correct_increment: f64,
    pub incorrect_decrement: f64,
    pub difficulty_weight_min: f64,
    pub difficulty_weight_max: f64,
    pub production_phase_streak: u32,
    pub production_phase_min_mastery: f64,
    pub application_phase_min_mastery: f64,
    pub application_phase_production: u32,
    pub ease_floor: f64,
    pub incorrect_ease_penalty: f64,
    pub max_review_interval_days: u32,
    pub fast_response_ms: i64,
    pub slow_response_ms: i64,
    pub confident_threshold: f64,
    pub unsure_threshold: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            correct_increment: 0.10,
            incorrect_decrement: 0.05,
            difficulty_weight_min: 0.8,
            difficulty_weight_max: 2.0,
            production_phase_streak: 4,
            production_phase_min_mastery: 0.50,
            application_phase_min_mastery: 0.85,
            application_phase_production: 2,
            ease_floor: 1.3,
            incorrect_ease_penalty: 0.2,
            max_review_interval_days: 3650,
            fast_response_ms: 3000,
            slow_response_ms: 10_000,
            confident_threshold: 0.7,
            unsure_threshold: 0.4,
        }
    }
}

impl MasteryConfig {
    pub fn clamp_weight(&self, weight: f64) -> f64 {
        weight.clamp(self.difficulty_weight_min, self.difficulty_weight_max)
    }
}
