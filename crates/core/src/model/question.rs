use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Malformed question data. Fatal for the question it was raised on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("choice question needs at least one option")]
    NoOptions,

    #[error("single choice question needs exactly one correct answer, found {found}")]
    SingleAnswerCount { found: usize },

    #[error("multiple choice question needs at least one correct answer")]
    NoCorrectAnswers,

    #[error("correct answer index {index} is out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },

    #[error("matching question is missing {0}")]
    MissingMatchingField(&'static str),

    #[error("matching left index {index} is out of range for {len} left items")]
    LeftOutOfRange { index: usize, len: usize },

    #[error("matching right index {index} is out of range for {len} right items")]
    RightOutOfRange { index: usize, len: usize },
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
    Matching,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
            QuestionKind::Matching => "matching",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── MATCHING SPEC ─────────────────────────────────────────────────────────────
//

/// Two item columns plus the ground-truth left → right mapping.
///
/// Not every left item needs an entry; several left items may share a right item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingSpec {
    left_items: Vec<String>,
    right_items: Vec<String>,
    correct_matches: BTreeMap<usize, usize>,
}

impl MatchingSpec {
    #[must_use]
    pub fn left_items(&self) -> &[String] {
        &self.left_items
    }

    #[must_use]
    pub fn right_items(&self) -> &[String] {
        &self.right_items
    }

    #[must_use]
    pub fn correct_matches(&self) -> &BTreeMap<usize, usize> {
        &self.correct_matches
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question input, as supplied by a question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answers: Vec<usize>,
    pub explanation: String,
    pub image_url: Option<String>,
    pub left_items: Option<Vec<String>>,
    pub right_items: Option<Vec<String>>,
    pub correct_matches: Option<BTreeMap<usize, usize>>,
}

impl QuestionDraft {
    /// Starts a single or multiple choice draft.
    #[must_use]
    pub fn choice(
        id: QuestionId,
        kind: QuestionKind,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_answers: Vec<usize>,
    ) -> Self {
        Self {
            id,
            kind,
            prompt: prompt.into(),
            options,
            correct_answers,
            explanation: String::new(),
            image_url: None,
            left_items: None,
            right_items: None,
            correct_matches: None,
        }
    }

    /// Starts a matching draft.
    #[must_use]
    pub fn matching(
        id: QuestionId,
        prompt: impl Into<String>,
        left_items: Vec<String>,
        right_items: Vec<String>,
        correct_matches: BTreeMap<usize, usize>,
    ) -> Self {
        Self {
            id,
            kind: QuestionKind::Matching,
            prompt: prompt.into(),
            options: Vec::new(),
            correct_answers: Vec::new(),
            explanation: String::new(),
            image_url: None,
            left_items: Some(left_items),
            right_items: Some(right_items),
            correct_matches: Some(correct_matches),
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Checks the per-kind invariants and freezes the draft into a `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt is blank, when a choice question's
    /// correct set has the wrong size or references a missing option, or when a
    /// matching question lacks its columns or ground truth.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        match self.kind {
            QuestionKind::Single | QuestionKind::Multiple => {
                if self.options.is_empty() {
                    return Err(QuestionError::NoOptions);
                }
                let correct_answers: BTreeSet<usize> =
                    self.correct_answers.iter().copied().collect();
                if let Some(&index) = correct_answers.iter().find(|&&i| i >= self.options.len()) {
                    return Err(QuestionError::AnswerOutOfRange {
                        index,
                        options: self.options.len(),
                    });
                }
                match self.kind {
                    QuestionKind::Single if correct_answers.len() != 1 => {
                        return Err(QuestionError::SingleAnswerCount {
                            found: correct_answers.len(),
                        });
                    }
                    QuestionKind::Multiple if correct_answers.is_empty() => {
                        return Err(QuestionError::NoCorrectAnswers);
                    }
                    _ => {}
                }

                Ok(Question {
                    id: self.id,
                    kind: self.kind,
                    prompt,
                    options: self.options,
                    correct_answers,
                    explanation: self.explanation,
                    image_url: self.image_url,
                    matching: None,
                })
            }
            QuestionKind::Matching => {
                let left_items = self
                    .left_items
                    .filter(|items| !items.is_empty())
                    .ok_or(QuestionError::MissingMatchingField("left items"))?;
                let right_items = self
                    .right_items
                    .filter(|items| !items.is_empty())
                    .ok_or(QuestionError::MissingMatchingField("right items"))?;
                let correct_matches = self
                    .correct_matches
                    .filter(|matches| !matches.is_empty())
                    .ok_or(QuestionError::MissingMatchingField("correct matches"))?;

                for (&left, &right) in &correct_matches {
                    if left >= left_items.len() {
                        return Err(QuestionError::LeftOutOfRange {
                            index: left,
                            len: left_items.len(),
                        });
                    }
                    if right >= right_items.len() {
                        return Err(QuestionError::RightOutOfRange {
                            index: right,
                            len: right_items.len(),
                        });
                    }
                }

                Ok(Question {
                    id: self.id,
                    kind: QuestionKind::Matching,
                    prompt,
                    options: Vec::new(),
                    correct_answers: BTreeSet::new(),
                    explanation: self.explanation,
                    image_url: self.image_url,
                    matching: Some(MatchingSpec {
                        left_items,
                        right_items,
                        correct_matches,
                    }),
                })
            }
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Immutable, validated question.
///
/// Choice questions carry `options`/`correct_answers`; matching questions carry a
/// `MatchingSpec` and leave both empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    prompt: String,
    options: Vec<String>,
    correct_answers: BTreeSet<usize>,
    explanation: String,
    image_url: Option<String>,
    matching: Option<MatchingSpec>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answers(&self) -> &BTreeSet<usize> {
        &self.correct_answers
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Matching columns and ground truth; `None` for choice questions.
    #[must_use]
    pub fn matching(&self) -> Option<&MatchingSpec> {
        self.matching.as_ref()
    }

    #[must_use]
    pub fn is_matching(&self) -> bool {
        self.kind == QuestionKind::Matching
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn single_requires_exactly_one_answer() {
        let err = QuestionDraft::choice(QuestionId::new(1), QuestionKind::Single, "Q", opts(3), vec![0, 1])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::SingleAnswerCount { found: 2 });

        let err = QuestionDraft::choice(QuestionId::new(1), QuestionKind::Single, "Q", opts(3), vec![])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::SingleAnswerCount { found: 0 });
    }

    #[test]
    fn duplicate_indices_collapse_before_counting() {
        let question =
            QuestionDraft::choice(QuestionId::new(1), QuestionKind::Single, "Q", opts(3), vec![2, 2])
                .validate()
                .unwrap();
        assert_eq!(question.correct_answers().len(), 1);
    }

    #[test]
    fn multiple_requires_some_answer_within_range() {
        let err = QuestionDraft::choice(QuestionId::new(2), QuestionKind::Multiple, "Q", opts(3), vec![])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::NoCorrectAnswers);

        let err =
            QuestionDraft::choice(QuestionId::new(2), QuestionKind::Multiple, "Q", opts(3), vec![0, 3])
                .validate()
                .unwrap_err();
        assert_eq!(err, QuestionError::AnswerOutOfRange { index: 3, options: 3 });
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = QuestionDraft::choice(QuestionId::new(3), QuestionKind::Single, "  ", opts(2), vec![0])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyPrompt);
    }

    #[test]
    fn matching_requires_columns_and_truth() {
        let mut draft = QuestionDraft::matching(
            QuestionId::new(4),
            "Match",
            opts(2),
            opts(2),
            BTreeMap::from([(0, 1)]),
        );
        draft.right_items = None;
        assert_eq!(
            draft.validate().unwrap_err(),
            QuestionError::MissingMatchingField("right items")
        );

        let draft = QuestionDraft::matching(QuestionId::new(4), "Match", opts(2), opts(2), BTreeMap::new());
        assert_eq!(
            draft.validate().unwrap_err(),
            QuestionError::MissingMatchingField("correct matches")
        );
    }

    #[test]
    fn matching_truth_must_reference_valid_items() {
        let draft = QuestionDraft::matching(
            QuestionId::new(5),
            "Match",
            opts(2),
            opts(3),
            BTreeMap::from([(0, 1), (2, 0)]),
        );
        assert_eq!(
            draft.validate().unwrap_err(),
            QuestionError::LeftOutOfRange { index: 2, len: 2 }
        );

        let draft = QuestionDraft::matching(
            QuestionId::new(5),
            "Match",
            opts(2),
            opts(3),
            BTreeMap::from([(1, 3)]),
        );
        assert_eq!(
            draft.validate().unwrap_err(),
            QuestionError::RightOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn valid_matching_question_keeps_choice_fields_empty() {
        let question = QuestionDraft::matching(
            QuestionId::new(6),
            "Match capitals",
            opts(3),
            opts(2),
            BTreeMap::from([(0, 1), (1, 1)]),
        )
        .with_explanation("Two cities share a country")
        .validate()
        .unwrap();

        assert!(question.is_matching());
        assert!(question.options().is_empty());
        assert!(question.correct_answers().is_empty());
        assert_eq!(question.matching().unwrap().correct_matches().len(), 2);
        assert_eq!(question.explanation(), "Two cities share a country");
    }
}
