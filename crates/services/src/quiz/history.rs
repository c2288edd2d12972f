use std::sync::Arc;

use chrono::{DateTime, Utc};

use quiz_core::model::{AttemptId, UserId};
use quiz_core::time::format_mm_ss;
use storage::repository::{AttemptHistory, StoredAttempt};

use crate::error::QuizServiceError;

/// One row of a user's attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub saved_at: DateTime<Utc>,
    pub module: String,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub score_percentage: u32,
    pub time_taken: u32,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_stored(attempt: &StoredAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            saved_at: attempt.saved_at,
            module: attempt.payload.module.clone(),
            correct_answers: attempt.payload.correct_answers,
            total_questions: attempt.payload.total_questions,
            score_percentage: attempt.payload.score_percentage,
            time_taken: attempt.payload.time_taken,
        }
    }

    /// Time taken as `MM:SS`.
    #[must_use]
    pub fn time_taken_label(&self) -> String {
        format_mm_ss(self.time_taken)
    }
}

/// Read-only access to saved attempts.
#[derive(Clone)]
pub struct AttemptHistoryService {
    history: Arc<dyn AttemptHistory>,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn AttemptHistory>) -> Self {
        Self { history }
    }

    /// Most recent attempts for `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` on backend failures.
    pub async fn list_recent(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptListItem>, QuizServiceError> {
        let attempts = self.history.list_attempts(user, limit).await?;
        Ok(attempts.iter().map(AttemptListItem::from_stored).collect())
    }

    /// Full stored attempt including per-question results.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if missing or on backend failures.
    pub async fn get(&self, id: &AttemptId) -> Result<StoredAttempt, QuizServiceError> {
        Ok(self.history.get_attempt(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::AttemptPayload;
    use storage::repository::{AttemptStore, InMemoryRepository, StorageError};

    #[tokio::test]
    async fn lists_newest_first_with_labels() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("u1");
        for (correct, secs) in [(1, 59), (2, 125)] {
            let payload = AttemptPayload {
                module: "quiz".into(),
                total_questions: 2,
                correct_answers: correct,
                score_percentage: 50 * u32::try_from(correct).unwrap(),
                time_taken: secs,
                question_results: Vec::new(),
            };
            repo.save_attempt(&user, &payload).await.unwrap();
        }

        let svc = AttemptHistoryService::new(Arc::new(repo));
        let items = svc.list_recent(&user, 5).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].score_percentage, 100);
        assert_eq!(items[0].time_taken_label(), "02:05");
        assert_eq!(items[1].time_taken_label(), "00:59");

        let full = svc.get(&items[1].id).await.unwrap();
        assert_eq!(full.payload.correct_answers, 1);
        assert!(matches!(
            svc.get(&AttemptId::new("nope")).await,
            Err(QuizServiceError::Storage(StorageError::NotFound))
        ));
    }
}
