use thiserror::Error;

use crate::matching::{MatchGrade, grade_matches};
use crate::model::{Question, QuestionKind, Submission};

/// A submission that cannot be graded against the question it targets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("{question} question cannot take a {submitted} submission")]
    KindMismatch {
        question: QuestionKind,
        submitted: &'static str,
    },

    #[error("selected option {index} is out of range for {options} options")]
    OptionOutOfRange { index: usize, options: usize },

    #[error("connection {left} -> {right} is outside the matching columns")]
    ConnectionOutOfRange { left: usize, right: usize },
}

/// Decide whether `submission` answers `question` correctly.
///
/// Choice questions need the exact correct set; there is no partial credit.
/// Matching questions are graded by [`grade_matches`].
///
/// # Errors
///
/// Returns `EvaluationError` when the submission shape does not fit the
/// question type or references options/items the question does not have.
pub fn evaluate(question: &Question, submission: &Submission) -> Result<bool, EvaluationError> {
    match (question.kind(), submission) {
        (QuestionKind::Single | QuestionKind::Multiple, Submission::Choice(selected)) => {
            let options = question.options().len();
            if let Some(&index) = selected.iter().find(|&&i| i >= options) {
                return Err(EvaluationError::OptionOutOfRange { index, options });
            }
            Ok(selected == question.correct_answers())
        }
        (QuestionKind::Matching, Submission::Matching(_)) => {
            Ok(evaluate_matching(question, submission)?.is_correct)
        }
        (kind, Submission::Choice(_)) => Err(EvaluationError::KindMismatch {
            question: kind,
            submitted: "choice",
        }),
        (kind, Submission::Matching(_)) => Err(EvaluationError::KindMismatch {
            question: kind,
            submitted: "matching",
        }),
    }
}

/// Grade a matching submission with per-left detail.
///
/// # Errors
///
/// Returns `EvaluationError::KindMismatch` for non-matching questions or
/// submissions, and `ConnectionOutOfRange` for links outside the columns.
pub fn evaluate_matching(
    question: &Question,
    submission: &Submission,
) -> Result<MatchGrade, EvaluationError> {
    let (Some(spec), Submission::Matching(user_matches)) = (question.matching(), submission)
    else {
        return Err(EvaluationError::KindMismatch {
            question: question.kind(),
            submitted: match submission {
                Submission::Choice(_) => "choice",
                Submission::Matching(_) => "matching",
            },
        });
    };

    let (lefts, rights) = (spec.left_items().len(), spec.right_items().len());
    if let Some((&left, &right)) = user_matches
        .iter()
        .find(|(left, right)| **left >= lefts || **right >= rights)
    {
        return Err(EvaluationError::ConnectionOutOfRange { left, right });
    }

    Ok(grade_matches(user_matches, spec.correct_matches()))
}
