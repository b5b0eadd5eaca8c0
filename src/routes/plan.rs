use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::planning::CandidatePlan;
use crate::response::{ok, AppError};
use crate::routes::learner_id;
use crate::services::plan;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/today", get(today))
        .route("/normalize", post(normalize))
        .route("/today/activities/:activity_id/complete", post(complete))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinutesQuery {
    minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeBody {
    plan: CandidatePlan,
    #[serde(default)]
    minutes: Option<i64>,
}

async fn today(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MinutesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let plan = plan::daily_plan(&state, &learner_id, query.minutes, Utc::now()).await;
    Ok(ok(plan))
}

async fn normalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NormalizeBody>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let plan =
        plan::normalize_candidate(&state, &learner_id, &body.plan, body.minutes, Utc::now()).await;
    Ok(ok(plan))
}

async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(activity_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = learner_id(&headers)?;
    let activity = plan::complete_activity(&state, &learner_id, &activity_id, Utc::now()).await?;
    Ok(ok(activity))
}
