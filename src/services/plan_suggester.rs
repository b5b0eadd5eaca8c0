use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::planning::{CandidatePlan, PlanRequest};

const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("plan suggester not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client for an external service that proposes candidate plans. Whatever it
/// returns still goes through normalization before a learner sees it.
#[derive(Clone)]
pub struct PlanSuggester {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl PlanSuggester {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            client,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    pub fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    pub async fn suggest(&self, request: &PlanRequest) -> Result<CandidatePlan, SuggestError> {
        let url = self.endpoint.as_deref().ok_or(SuggestError::NotConfigured)?;
        let mut last_error: Option<SuggestError> = None;

        for retry in 0..=MAX_RETRIES {
            let err = match self.client.post(url).json(request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        let candidate: CandidatePlan = serde_json::from_slice(&bytes)?;
                        debug!(activities = candidate.activities.len(), "Received candidate plan");
                        return Ok(candidate);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    if !is_retryable(status) {
                        return Err(SuggestError::HttpStatus { status, body });
                    }
                    SuggestError::HttpStatus { status, body }
                }
                Err(e) => SuggestError::Request(e),
            };

            if retry < MAX_RETRIES {
                warn!(retry, error = %err, "Plan suggester request failed, retrying");
                sleep(Duration::from_millis(BASE_BACKOFF_MS * (1 << retry))).await;
            }
            last_error = Some(err);
        }

        Err(last_error.unwrap_or(SuggestError::NotConfigured))
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
