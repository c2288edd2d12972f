#![forbid(unsafe_code)]

pub mod auth;
pub mod error;
pub mod http_store;
pub mod quiz;

pub use quiz_core::Clock;

pub use auth::{AuthProvider, AuthState};
pub use error::{HttpStoreError, QuizServiceError};
pub use http_store::{HttpAttemptStore, HttpStoreConfig};
pub use quiz::{
    ActiveQuiz, AnswerFeedback, AttemptHistoryService, AttemptListItem, CountdownTicker,
    QuizLoopService, SaveOutcome,
};
