#![forbid(unsafe_code)]

pub mod error;
pub mod evaluator;
pub mod matching;
pub mod model;
pub mod session;
pub mod summary;
pub mod time;
pub mod timer;

pub use error::Error;
pub use time::Clock;

pub use evaluator::{EvaluationError, evaluate};
pub use matching::{Connection, LeftSelection, MatchGrade, MatchingBoard};
pub use session::{
    Advance, FinishReason, QuizOptions, QuizProgress, QuizSession, SessionError, SessionStatus,
};
pub use summary::{AttemptPayload, QuestionResult, QuestionResultPayload, SessionSummary, summarize};
pub use timer::{CountdownTimer, Tick, TimerState};
