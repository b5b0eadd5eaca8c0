use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;

use crate::core::EventBus;
use crate::response::{ok, AppError};
use crate::routes::learner_id;
use crate::services::session;
use crate::state::AppState;

const KEEP_ALIVE_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/cancel", post(cancel))
        .route("/current", get(current))
        .route("/events", get(events))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    activity_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsQuery {
    /// Comma-separated event types, e.g. `SESSION_TICK,SESSION_FLUSHED`.
    types: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelledDto {
    cancelled: bool,
}

async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let outcome = session::start(&state, &learner_id, &body.activity_id, Utc::now()).await?;
    Ok(ok(outcome))
}

async fn pause(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    Ok(ok(session::pause(&state, &learner_id).await?))
}

async fn resume(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    Ok(ok(session::resume(&state, &learner_id).await?))
}

async fn stop(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    Ok(ok(session::stop(&state, &learner_id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    session::cancel(&state, &learner_id).await?;
    Ok(ok(CancelledDto { cancelled: true }))
}

async fn current(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    Ok(ok(session::current(&state, &learner_id).await))
}

struct SubscriptionGuard {
    bus: Arc<EventBus>,
    subscriber_id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscriber_id);
    }
}

async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let event_types = query.types.map(|types| {
        types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let bus = state.event_bus();
    let (subscriber_id, receiver) = bus.subscribe_filtered(Some(learner_id), event_types);
    let guard = SubscriptionGuard {
        bus,
        subscriber_id,
    };

    let stream = BroadcastStream::new(receiver).filter_map(move |msg| {
        let _guard = &guard;
        let event = match msg {
            Ok(envelope) => match serde_json::to_string(&envelope.event) {
                Ok(data) => Some(Ok::<Event, Infallible>(
                    Event::default()
                        .id(envelope.sequence.to_string())
                        .event(envelope.event.event_type())
                        .data(data),
                )),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode session event");
                    None
                }
            },
            // Lagged receivers skip what they missed.
            Err(_) => None,
        };
        async move { event }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    ))
}
