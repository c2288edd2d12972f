use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::ids::QuestionId;

/// A user's answer to one question, before grading.
///
/// Choice questions take a set of option indices; selection order is irrelevant.
/// Matching questions take the user's left → right connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Submission {
    Choice(BTreeSet<usize>),
    Matching(BTreeMap<usize, usize>),
}

impl Submission {
    /// A single selected option.
    #[must_use]
    pub fn single(index: usize) -> Self {
        Self::Choice(BTreeSet::from([index]))
    }

    #[must_use]
    pub fn choices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Choice(indices.into_iter().collect())
    }

    /// Builds a matching submission; a later pair for the same left index wins.
    #[must_use]
    pub fn matches(pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        Self::Matching(pairs.into_iter().collect())
    }

    #[must_use]
    pub fn selected_indices(&self) -> Option<&BTreeSet<usize>> {
        match self {
            Submission::Choice(set) => Some(set),
            Submission::Matching(_) => None,
        }
    }

    #[must_use]
    pub fn user_matches(&self) -> Option<&BTreeMap<usize, usize>> {
        match self {
            Submission::Choice(_) => None,
            Submission::Matching(map) => Some(map),
        }
    }
}

/// Graded entry in a session's answer log. Position in the log is the ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    /// Index of the question within the session's working set.
    pub question_index: usize,
    pub submission: Submission,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_selection_order_is_irrelevant() {
        assert_eq!(Submission::choices([2, 0]), Submission::choices([0, 2]));
        assert_eq!(Submission::single(1).selected_indices().unwrap().len(), 1);
    }

    #[test]
    fn matching_submission_keeps_one_target_per_left() {
        let submission = Submission::matches([(0, 1), (0, 2)]);
        let matches = submission.user_matches().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[&0], 2);
        assert!(submission.selected_indices().is_none());
    }
}
