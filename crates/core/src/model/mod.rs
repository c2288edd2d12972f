mod answer;
mod ids;
mod question;

pub use answer::{AnswerRecord, Submission};
pub use ids::{AttemptId, ParseIdError, QuestionId, UserId};
pub use question::{MatchingSpec, Question, QuestionDraft, QuestionError, QuestionKind};
