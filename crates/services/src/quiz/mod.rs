mod history;
mod ticker;
mod workflow;

pub use history::{AttemptHistoryService, AttemptListItem};
pub use ticker::CountdownTicker;
pub use workflow::{ActiveQuiz, AnswerFeedback, QuizLoopService, SaveOutcome};
