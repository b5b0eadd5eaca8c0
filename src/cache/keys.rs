use chrono::NaiveDate;

pub fn daily_plan_key(learner_id: &str, date: NaiveDate) -> String {
    format!("plan:{}:{}", learner_id, date.format("%Y-%m-%d"))
}
