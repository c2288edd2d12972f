use thiserror::Error;

use crate::evaluator::EvaluationError;
use crate::model::QuestionError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
