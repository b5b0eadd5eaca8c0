pub mod keys;

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::debug;

use crate::planning::DailyPlan;

use self::keys::daily_plan_key;

/// Read-mostly cache of generated plans keyed by learner and UTC date.
#[derive(Default)]
pub struct DailyPlanCache {
    entries: RwLock<HashMap<String, DailyPlan>>,
}

impl DailyPlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, learner_id: &str, date: NaiveDate) -> Option<DailyPlan> {
        self.entries
            .read()
            .get(&daily_plan_key(learner_id, date))
            .filter(|plan| plan.date == date)
            .cloned()
    }

    pub fn insert(&self, learner_id: &str, plan: DailyPlan) {
        let key = daily_plan_key(learner_id, plan.date);
        self.entries.write().insert(key, plan);
    }

    pub fn invalidate(&self, learner_id: &str, date: NaiveDate) -> bool {
        self.entries
            .write()
            .remove(&daily_plan_key(learner_id, date))
            .is_some()
    }

    /// Evicts every plan dated before `date`. Returns the number removed.
    pub fn purge_before(&self, date: NaiveDate) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, plan| plan.date >= date);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, %date, "Purged stale daily plans");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
