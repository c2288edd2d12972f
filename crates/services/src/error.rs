//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::SessionError;
use storage::repository::StorageError;

/// Errors emitted by `HttpAttemptStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpStoreError {
    #[error("persistence endpoint returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("persistence endpoint response had no attempt id")]
    MissingAttemptId,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<HttpStoreError> for StorageError {
    fn from(err: HttpStoreError) -> Self {
        match err {
            HttpStoreError::HttpStatus(status) => StorageError::Rejected(status.to_string()),
            HttpStoreError::MissingAttemptId => StorageError::Serialization(err.to_string()),
            HttpStoreError::Http(e) => StorageError::Connection(e.to_string()),
        }
    }
}

/// Errors emitted by quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("quiz is not finished yet")]
    NotFinished,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuizServiceError {
    /// True for failures worth offering the user a retry on.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuizServiceError::Storage(
                StorageError::Connection(_) | StorageError::Rejected(_)
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn non_success_status_is_a_retryable_rejection() {
        let err = StorageError::from(HttpStoreError::HttpStatus(StatusCode::BAD_GATEWAY));
        assert!(matches!(err, StorageError::Rejected(_)));
        assert!(QuizServiceError::Storage(err).is_retryable());
    }

    #[test]
    fn missing_attempt_id_is_not_retryable() {
        let err = StorageError::from(HttpStoreError::MissingAttemptId);
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(!QuizServiceError::Storage(err).is_retryable());
    }

    #[test]
    fn unfinished_quiz_is_not_retryable() {
        assert!(!QuizServiceError::NotFinished.is_retryable());
    }
}
