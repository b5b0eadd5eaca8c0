//! Daily plan construction.

pub mod builder;
pub mod config;
pub mod history;
pub mod types;
pub mod validator;

pub use builder::{build, build_with_config, split_budget, BudgetSplit};
pub use config::PlanConfig;
pub use history::digest;
pub use types::{
    activity_id, ActivityHistorySummary, ActivityLogEntry, ActivityType, DailyPlan,
    LearningResource, MediaType, PlanActivity, PlanRequest, PlanSource, SkillProfile,
};
pub use validator::{normalize, normalize_with_config, CandidateActivity, CandidatePlan};
