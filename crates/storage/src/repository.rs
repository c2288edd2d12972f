use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{AttemptId, Question, UserId};
use quiz_core::{AttemptPayload, Clock};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("rejected by persistence endpoint: {0}")]
    Rejected(String),

    #[error("question bank has no usable questions")]
    EmptyBank,
}

/// A saved attempt as read back from history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttempt {
    pub id: AttemptId,
    pub user_id: UserId,
    pub saved_at: DateTime<Utc>,
    pub payload: AttemptPayload,
}

/// Supplies the question records a quiz is built from.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Load every usable question, in bank order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read or holds no valid question.
    async fn load_questions(&self) -> Result<Vec<Question>, StorageError>;
}

/// Accepts a finished-session payload and returns the stored record id.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persist one attempt for `user`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored. Callers may retry.
    async fn save_attempt(
        &self,
        user: &UserId,
        payload: &AttemptPayload,
    ) -> Result<AttemptId, StorageError>;
}

/// Read side of attempt persistence.
#[async_trait]
pub trait AttemptHistory: Send + Sync {
    /// Most recent attempts for `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError>;

    /// Fetch one attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: &AttemptId) -> Result<StoredAttempt, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    clock: Clock,
    questions: Arc<Mutex<Vec<Question>>>,
    attempts: Arc<Mutex<Vec<StoredAttempt>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            clock: Clock::default(),
            questions: Arc::new(Mutex::new(questions)),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Clock used to stamp `saved_at` on stored attempts.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the bank contents.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn set_questions(&self, questions: Vec<Question>) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = questions;
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn load_questions(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.is_empty() {
            return Err(StorageError::EmptyBank);
        }
        Ok(guard.clone())
    }
}

#[async_trait]
impl AttemptStore for InMemoryRepository {
    async fn save_attempt(
        &self,
        user: &UserId,
        payload: &AttemptPayload,
    ) -> Result<AttemptId, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = AttemptId::new((guard.len() + 1).to_string());
        guard.push(StoredAttempt {
            id: id.clone(),
            user_id: user.clone(),
            saved_at: self.clock.now(),
            payload: payload.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl AttemptHistory for InMemoryRepository {
    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .iter()
            .rev()
            .filter(|attempt| &attempt.user_id == user)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_attempt(&self, id: &AttemptId) -> Result<StoredAttempt, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|attempt| &attempt.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}
