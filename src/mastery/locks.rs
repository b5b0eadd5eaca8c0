use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per learner so writes for the same learner are serialized
/// while different learners proceed independently.
#[derive(Clone, Default)]
pub struct LearnerLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl LearnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, learner_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock();
            map.entry(learner_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops slots nobody holds or waits on.
    pub fn prune_idle(&self) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_learner_is_serialized() {
        let locks = LearnerLocks::new();
        let counter = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("learner-a").await;
                counter.lock().push(("enter", i));
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.lock().push(("exit", i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let events = counter.lock().clone();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "exit");
            assert_eq!(pair[0].1, pair[1].1);
        }
    }

    #[tokio::test]
    async fn test_different_learners_do_not_block() {
        let locks = LearnerLocks::new();
        let _a = locks.lock("learner-a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("learner-b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_idle() {
        let locks = LearnerLocks::new();
        let held = locks.lock("busy").await;
        drop(locks.lock("idle").await);
        assert_eq!(locks.prune_idle(), 1);
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.is_empty());
    }
}
