use std::sync::Arc;
use std::time::Instant;

use crate::cache::DailyPlanCache;
use crate::core::EventBus;
use crate::db::Store;
use crate::mastery::{LearnerLocks, MasteryConfig};
use crate::planning::PlanConfig;
use crate::services::plan_suggester::PlanSuggester;
use crate::services::session::SessionRegistry;
use crate::session::{MonotonicClock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    store: Store,
    plan_cache: Arc<DailyPlanCache>,
    locks: LearnerLocks,
    event_bus: Arc<EventBus>,
    sessions: Arc<SessionRegistry>,
    suggester: Arc<PlanSuggester>,
    plan_config: Arc<PlanConfig>,
    mastery_config: Arc<MasteryConfig>,
    target_language: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, suggester: PlanSuggester, target_language: impl Into<String>) -> Self {
        Self::with_clock(store, suggester, target_language, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        store: Store,
        suggester: PlanSuggester,
        target_language: impl Into<String>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let plan_cache = Arc::new(DailyPlanCache::new());
        let sessions = Arc::new(SessionRegistry::new(
            store.clone(),
            Arc::clone(&event_bus),
            Arc::clone(&plan_cache),
            clock,
        ));
        Self {
            started_at: Instant::now(),
            store,
            plan_cache,
            locks: LearnerLocks::default(),
            event_bus,
            sessions,
            suggester: Arc::new(suggester),
            plan_config: Arc::new(PlanConfig::default()),
            mastery_config: Arc::new(MasteryConfig::default()),
            target_language: Arc::from(target_language.into()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn plan_cache(&self) -> Arc<DailyPlanCache> {
        Arc::clone(&self.plan_cache)
    }

    pub fn locks(&self) -> &LearnerLocks {
        &self.locks
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    pub fn suggester(&self) -> &PlanSuggester {
        &self.suggester
    }

    pub fn plan_config(&self) -> &PlanConfig {
        &self.plan_config
    }

    pub fn mastery_config(&self) -> &MasteryConfig {
        &self.mastery_config
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }
}
