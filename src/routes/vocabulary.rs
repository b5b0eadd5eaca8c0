use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::mastery::Attempt;
use crate::response::{ok, AppError};
use crate::routes::learner_id;
use crate::services::mastery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/due-count", get(due_count))
        .route("/:word_id/progress", get(progress))
        .route("/:word_id/attempts", post(record_attempt))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DueCountDto {
    due_count: u32,
}

async fn due_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let due_count = mastery::due_count(&state, &learner_id, Utc::now()).await?;
    Ok(ok(DueCountDto { due_count }))
}

async fn progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let progress = mastery::get_progress(&state, &learner_id, &word_id).await?;
    Ok(ok(progress.view(Utc::now())))
}

async fn record_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
    Json(attempt): Json<Attempt>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let progress =
        mastery::record_attempt(&state, &learner_id, &word_id, &attempt, Utc::now()).await?;
    Ok(ok(progress.view(Utc::now())))
}
