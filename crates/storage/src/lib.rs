#![forbid(unsafe_code)]

pub mod bank;
pub mod repository;
pub mod sqlite;

pub use bank::{JsonFileBank, QuestionRecord, parse_bank};
pub use repository::{
    AttemptHistory, AttemptStore, InMemoryRepository, QuestionBank, StorageError, StoredAttempt,
};
