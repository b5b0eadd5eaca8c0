pub mod mastery;
pub mod plan;
pub mod plan_suggester;
pub mod session;

use thiserror::Error;

use crate::db::StoreError;
use crate::mastery::{AttemptError, VocabularyProgress};
use crate::session::TimerError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidAttempt(#[from] AttemptError),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Session(#[from] TimerError),
    /// The computation succeeded but could not be stored. `progress` carries
    /// the computed record so callers can retry the write alone.
    #[error("persistence failure: {source}")]
    Persistence {
        #[source]
        source: StoreError,
        progress: Option<Box<VocabularyProgress>>,
    },
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Persistence {
                source: other,
                progress: None,
            },
        }
    }
}
