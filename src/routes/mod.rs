mod health;
mod plan;
mod sessions;
mod vocabulary;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::{AppError, ErrorResponse};
use crate::state::AppState;

pub const LEARNER_HEADER: &str = "x-learner-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/plan", plan::router())
        .nest("/api/vocabulary", vocabulary::router())
        .nest("/api/sessions", sessions::router())
        .fallback(fallback_handler)
        .with_state(state)
}

/// The learner the request acts for. Missing or blank header is a 401.
pub(crate) fn learner_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(LEARNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("missing X-Learner-Id header"))
}

async fn fallback_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(ErrorResponse {
            success: false,
            error: "route not found".to_string(),
            code: "NOT_FOUND".to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_learner_id_from_header() {
        let mut headers = HeaderMap::new();
        assert!(learner_id(&headers).is_err());

        headers.insert(LEARNER_HEADER, HeaderValue::from_static("   "));
        assert!(learner_id(&headers).is_err());

        headers.insert(LEARNER_HEADER, HeaderValue::from_static(" learner-1 "));
        assert_eq!(learner_id(&headers).unwrap(), "learner-1");
    }
}
