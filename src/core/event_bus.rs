use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::session::SessionState;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    #[serde(rename = "SESSION_STATE_CHANGED")]
    StateChanged(StateChangedPayload),

    #[serde(rename = "SESSION_TICK")]
    Tick(TickPayload),

    #[serde(rename = "SESSION_FLUSHED")]
    Flushed(FlushedPayload),
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged(_) => "SESSION_STATE_CHANGED",
            SessionEvent::Tick(_) => "SESSION_TICK",
            SessionEvent::Flushed(_) => "SESSION_FLUSHED",
        }
    }

    pub fn learner_id(&self) -> &str {
        match self {
            SessionEvent::StateChanged(p) => &p.learner_id,
            SessionEvent::Tick(p) => &p.learner_id,
            SessionEvent::Flushed(p) => &p.learner_id,
        }
    }

    pub fn activity_id(&self) -> &str {
        match self {
            SessionEvent::StateChanged(p) => &p.activity_id,
            SessionEvent::Tick(p) => &p.activity_id,
            SessionEvent::Flushed(p) => &p.activity_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedPayload {
    pub learner_id: String,
    pub activity_id: String,
    pub plan_date: NaiveDate,
    pub from: SessionState,
    pub to: SessionState,
    pub elapsed_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickPayload {
    pub learner_id: String,
    pub activity_id: String,
    pub elapsed_seconds: u64,
    /// Includes minutes persisted before this session started.
    pub cumulative_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushedPayload {
    pub learner_id: String,
    pub activity_id: String,
    pub plan_date: NaiveDate,
    pub minutes: u32,
    pub flushed_minutes: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub event: SessionEvent,
    pub created_at: DateTime<Utc>,
}

type SubscriberId = u64;

struct Subscriber {
    learner_id: Option<String>,
    event_types: Option<Vec<String>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref learner_id) = self.learner_id {
            if envelope.event.learner_id() != learner_id {
                return false;
            }
        }

        if let Some(ref event_types) = self.event_types {
            if !event_types
                .iter()
                .any(|t| t == envelope.event.event_type())
            {
                return false;
            }
        }

        true
    }
}

pub struct EventBus {
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    sequence: AtomicU64,
    next_subscriber: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            next_subscriber: AtomicU64::new(1),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            event,
            created_at: Utc::now(),
        };

        let mut sent_count = 0usize;
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.values() {
                if subscriber.matches(&envelope) && subscriber.sender.send(envelope.clone()).is_ok()
                {
                    sent_count += 1;
                }
            }
        }

        let event_type = envelope.event.event_type();
        let learner_id = envelope.event.learner_id().to_string();
        if self.global_sender.send(envelope).is_err() {
            debug!("No global subscribers for event");
        }

        debug!(
            event_type = event_type,
            learner_id = %learner_id,
            sent_to = sent_count,
            "Event published"
        );
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub fn subscribe_filtered(
        &self,
        learner_id: Option<String>,
        event_types: Option<Vec<String>>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);

        self.subscribers.write().insert(
            subscriber_id,
            Subscriber {
                learner_id,
                event_types,
                sender,
            },
        );

        debug!(subscriber_id, "New filtered subscription created");
        (subscriber_id, receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        if self.subscribers.write().remove(&subscriber_id).is_some() {
            debug!(subscriber_id, "Subscription removed");
        }
    }

    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EventBusStats {
        let filtered_subscribers = self.subscribers.read().len();
        let global_subscribers = self.global_sender.receiver_count();
        EventBusStats {
            total_events: self.event_count(),
            subscriber_count: filtered_subscribers + global_subscribers,
            global_subscribers,
            filtered_subscribers,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBusStats {
    pub total_events: u64,
    pub subscriber_count: usize,
    pub global_subscribers: usize,
    pub filtered_subscribers: usize,
}
