use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::matching::{Connection, missing_connections};
use crate::model::{QuestionId, QuestionKind, Submission};
use crate::session::{FinishReason, QuizSession};

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// One graded answer enriched with the question's display fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub explanation: String,
    pub image_url: Option<String>,
    pub submission: Submission,
    pub correct_answers: BTreeSet<usize>,
    pub left_items: Vec<String>,
    pub right_items: Vec<String>,
    pub correct_matches: BTreeMap<usize, usize>,
    /// Required pairs the user missed; empty for choice questions.
    pub missing_connections: Vec<Connection>,
    pub is_correct: bool,
}

/// Read-only result of a session, ready for display or storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub total_questions: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub correct: usize,
    pub percentage: u32,
    pub elapsed_seconds: u32,
    pub finish_reason: Option<FinishReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<QuestionResult>,
}

/// `round(correct / answered * 100)`, or 0 when nothing was answered.
#[must_use]
pub fn score_percentage(correct: usize, answered: usize) -> u32 {
    if answered == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = ((correct as f64 / answered as f64) * 100.0).round() as u32;
    pct
}

/// Summarize a session in any state. Performs no I/O.
#[must_use]
pub fn summarize(session: &QuizSession) -> SessionSummary {
    let questions = session.questions();
    let results = session
        .answers()
        .iter()
        .filter_map(|record| {
            let question = questions.get(record.question_index)?;
            let (left_items, right_items, correct_matches, missing) = match question.matching() {
                Some(spec) => {
                    let missing = record
                        .submission
                        .user_matches()
                        .map(|user| missing_connections(user, spec.correct_matches()))
                        .unwrap_or_default();
                    (
                        spec.left_items().to_vec(),
                        spec.right_items().to_vec(),
                        spec.correct_matches().clone(),
                        missing,
                    )
                }
                None => (Vec::new(), Vec::new(), BTreeMap::new(), Vec::new()),
            };

            Some(QuestionResult {
                question_id: record.question_id,
                kind: question.kind(),
                prompt: question.prompt().to_owned(),
                options: question.options().to_vec(),
                explanation: question.explanation().to_owned(),
                image_url: question.image_url().map(str::to_owned),
                submission: record.submission.clone(),
                correct_answers: question.correct_answers().clone(),
                left_items,
                right_items,
                correct_matches,
                missing_connections: missing,
                is_correct: record.is_correct,
            })
        })
        .collect();

    let answered = session.answers().len();
    let correct = session.score();
    SessionSummary {
        total_questions: questions.len(),
        answered,
        unanswered: questions.len().saturating_sub(answered),
        correct,
        percentage: score_percentage(correct, answered),
        elapsed_seconds: session.elapsed_seconds(),
        finish_reason: session.finish_reason(),
        started_at: session.started_at(),
        completed_at: session.completed_at(),
        results,
    }
}

//
// ─── PERSISTENCE PAYLOAD ───────────────────────────────────────────────────────
//

/// Per-question entry of the persistence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResultPayload {
    pub question_id: QuestionId,
    pub question_type: QuestionKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_answers: Option<BTreeSet<usize>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub correct_answers: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_matches: Option<BTreeMap<usize, usize>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub correct_matches: BTreeMap<usize, usize>,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: String,
}

/// Body handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptPayload {
    pub module: String,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub score_percentage: u32,
    /// Seconds spent in the session.
    pub time_taken: u32,
    pub question_results: Vec<QuestionResultPayload>,
}

impl SessionSummary {
    #[must_use]
    pub fn to_payload(&self, module: &str) -> AttemptPayload {
        AttemptPayload {
            module: module.to_owned(),
            total_questions: self.total_questions,
            correct_answers: self.correct,
            score_percentage: self.percentage,
            time_taken: self.elapsed_seconds,
            question_results: self.results.iter().map(QuestionResultPayload::from).collect(),
        }
    }
}

impl From<&QuestionResult> for QuestionResultPayload {
    fn from(result: &QuestionResult) -> Self {
        Self {
            question_id: result.question_id,
            question_type: result.kind,
            prompt: result.prompt.clone(),
            options: result.options.clone(),
            selected_answers: result.submission.selected_indices().cloned(),
            correct_answers: result.correct_answers.clone(),
            user_matches: result.submission.user_matches().cloned(),
            correct_matches: result.correct_matches.clone(),
            is_correct: result.is_correct,
            explanation: result.explanation.clone(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
