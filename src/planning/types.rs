use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::config::PlanConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    VocabularyReview,
    Reading,
    Listening,
    Shadowing,
    Cloze,
    Translation,
    VocabularyGame,
    Conversation,
}

impl ActivityType {
    pub const ALL: [ActivityType; 8] = [
        Self::VocabularyReview,
        Self::Reading,
        Self::Listening,
        Self::Shadowing,
        Self::Cloze,
        Self::Translation,
        Self::VocabularyGame,
        Self::Conversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VocabularyReview => "VocabularyReview",
            Self::Reading => "Reading",
            Self::Listening => "Listening",
            Self::Shadowing => "Shadowing",
            Self::Cloze => "Cloze",
            Self::Translation => "Translation",
            Self::VocabularyGame => "VocabularyGame",
            Self::Conversation => "Conversation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn uses_vocabulary(&self) -> bool {
        matches!(self, Self::VocabularyReview | Self::VocabularyGame)
    }

    /// Activity types that are meaningless on a resource without text.
    pub fn needs_word_count(&self) -> bool {
        matches!(
            self,
            Self::Reading | Self::Cloze | Self::Translation | Self::Shadowing
        )
    }

    pub fn minutes_range(&self, config: &PlanConfig) -> (u32, u32) {
        match self {
            Self::VocabularyReview => {
                (config.vocabulary_min_minutes, config.vocabulary_max_minutes)
            }
            _ => (config.activity_min_minutes, config.activity_max_minutes),
        }
    }

    pub fn clamp_minutes(&self, minutes: i64, config: &PlanConfig) -> u32 {
        let (min, max) = self.minutes_range(config);
        minutes.clamp(min as i64, max as i64) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Text,
    Audio,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Audio => "Audio",
            Self::Video => "Video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Text" => Some(Self::Text),
            "Audio" => Some(Self::Audio),
            "Video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn activity_types(&self) -> &'static [ActivityType] {
        match self {
            Self::Text => &[
                ActivityType::Reading,
                ActivityType::Cloze,
                ActivityType::Translation,
            ],
            Self::Audio | Self::Video => &[ActivityType::Listening, ActivityType::Shadowing],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningResource {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
    pub language: String,
    #[serde(default)]
    pub word_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfile {
    pub id: String,
    pub title: String,
    pub language: String,
}

/// One row of the raw activity log supplied by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub date: DateTime<Utc>,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub minutes_spent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityHistorySummary {
    /// Most recent occurrence within the window.
    pub date: DateTime<Utc>,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub minutes_spent: u32,
    #[serde(default)]
    pub sessions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanSource {
    Deterministic,
    Generated,
}

impl PlanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "Deterministic",
            Self::Generated => "Generated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Generated" => Self::Generated,
            _ => Self::Deterministic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanActivity {
    pub id: String,
    pub activity_type: ActivityType,
    pub resource_id: Option<String>,
    pub skill_id: Option<String>,
    pub estimated_minutes: u32,
    pub priority: u32,
    pub vocab_word_count: Option<u32>,
    #[serde(default)]
    pub minutes_spent: u32,
    #[serde(default)]
    pub is_completed: bool,
}

impl PlanActivity {
    pub fn new(date: NaiveDate, priority: u32, activity_type: ActivityType, minutes: u32) -> Self {
        Self {
            id: activity_id(date, priority),
            activity_type,
            resource_id: None,
            skill_id: None,
            estimated_minutes: minutes,
            priority,
            vocab_word_count: None,
            minutes_spent: 0,
            is_completed: false,
        }
    }
}

pub fn activity_id(date: NaiveDate, priority: u32) -> String {
    format!("{}-{}", date.format("%Y-%m-%d"), priority)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub activities: Vec<PlanActivity>,
    pub rationale: String,
    pub source: PlanSource,
}

impl DailyPlan {
    pub fn total_estimated_minutes(&self) -> u32 {
        self.activities.iter().map(|a| a.estimated_minutes).sum()
    }

    pub fn activity(&self, activity_id: &str) -> Option<&PlanActivity> {
        self.activities.iter().find(|a| a.id == activity_id)
    }
}

fn default_session_minutes() -> i64 {
    PlanConfig::default().default_session_minutes as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default = "default_session_minutes")]
    pub preferred_session_minutes: i64,
    #[serde(default)]
    pub vocabulary_due_count: u32,
    #[serde(default)]
    pub recent_history: Vec<ActivityHistorySummary>,
    #[serde(default)]
    pub available_resources: Vec<LearningResource>,
    #[serde(default)]
    pub available_skills: Vec<SkillProfile>,
    /// Empty matches every language.
    #[serde(default)]
    pub target_language: String,
    pub now: DateTime<Utc>,
}

impl PlanRequest {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            preferred_session_minutes: default_session_minutes(),
            vocabulary_due_count: 0,
            recent_history: Vec::new(),
            available_resources: Vec::new(),
            available_skills: Vec::new(),
            target_language: String::new(),
            now,
        }
    }

    /// Budget clamped into the supported range; never rejected.
    pub fn session_minutes(&self, config: &PlanConfig) -> u32 {
        self.preferred_session_minutes
            .clamp(config.min_session_minutes as i64, config.max_session_minutes as i64)
            as u32
    }

    pub fn matches_language(&self, language: &str) -> bool {
        let target = self.target_language.trim();
        target.is_empty() || target.eq_ignore_ascii_case(language.trim())
    }

    pub fn has_resource(&self, id: &str) -> bool {
        self.available_resources.iter().any(|r| r.id == id)
    }

    pub fn has_skill(&self, id: &str) -> bool {
        self.available_skills.iter().any(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_round_trip_names() {
        for t in ActivityType::ALL {
            assert_eq!(ActivityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ActivityType::parse("Dance"), None);
    }

    #[test]
    fn test_minutes_ranges() {
        let config = PlanConfig::default();
        assert_eq!(ActivityType::VocabularyReview.minutes_range(&config), (6, 12));
        assert_eq!(ActivityType::Reading.minutes_range(&config), (5, 15));
        assert_eq!(ActivityType::VocabularyReview.clamp_minutes(30, &config), 12);
        assert_eq!(ActivityType::Conversation.clamp_minutes(-3, &config), 5);
    }

    #[test]
    fn test_session_minutes_clamped() {
        let config = PlanConfig::default();
        let mut request = PlanRequest::new(Utc::now());
        request.preferred_session_minutes = 0;
        assert_eq!(request.session_minutes(&config), 10);
        request.preferred_session_minutes = 500;
        assert_eq!(request.session_minutes(&config), 90);
    }

    #[test]
    fn test_language_match_is_case_insensitive() {
        let mut request = PlanRequest::new(Utc::now());
        assert!(request.matches_language("de"));
        request.target_language = "ES".to_string();
        assert!(request.matches_language("es"));
        assert!(!request.matches_language("fr"));
    }

    #[test]
    fn test_plan_activity_serializes_nullable_ids() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let activity = PlanActivity::new(date, 2, ActivityType::Conversation, 10);
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["id"], "2024-03-01-2");
        assert!(json["resourceId"].is_null());
        assert!(json["skillId"].is_null());
        assert!(json["vocabWordCount"].is_null());
    }
}
