use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::Clock;
use crate::evaluator::{EvaluationError, evaluate};
use crate::model::{AnswerRecord, Question, Submission};
use crate::summary::{SessionSummary, summarize};
use crate::timer::{CountdownTimer, Tick};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected session operation. State is left exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid session state: cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("invalid session state: question {index} already has an answer")]
    AlreadySubmitted { index: usize },

    #[error("invalid session state: question {index} has not been answered")]
    NotSubmitted { index: usize },

    #[error("no questions available for quiz")]
    Empty,

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Finished => "finished",
        })
    }
}

/// How a session reached `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinishReason {
    /// The last question was answered and acknowledged.
    Completed,
    /// The countdown ran out.
    TimeExpired,
    /// The caller ended the session early.
    Abandoned,
}

/// Result of acknowledging the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the question at this index.
    Next(usize),
    Finished,
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// Knobs for `QuizSession::start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizOptions {
    /// Cap on the number of questions. Applied (after a shuffle) only when it is
    /// strictly between zero and the bank size.
    pub limit_count: Option<usize>,
    pub time_limit_secs: Option<u32>,
    /// Shuffle the working set even when no cap applies.
    pub shuffle: bool,
}

impl QuizOptions {
    #[must_use]
    pub fn with_limit_count(mut self, count: usize) -> Self {
        self.limit_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizProgress {
    pub status: SessionStatus,
    pub total: usize,
    pub answered: usize,
    pub current_index: usize,
    pub remaining_questions: usize,
    pub score: usize,
    pub awaiting_advance: bool,
    pub elapsed_seconds: u32,
    pub remaining_seconds: Option<u32>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Quiz session state machine: `NotStarted → InProgress → Finished`.
///
/// Answers are graded on submission; the caller must `advance` after showing
/// feedback. A finished session only leaves `Finished` through `reset` or
/// `restart`, both of which discard all prior state.
pub struct QuizSession {
    id: Uuid,
    clock: Clock,
    status: SessionStatus,
    source: Vec<Question>,
    options: QuizOptions,
    questions: Vec<Question>,
    current: usize,
    score: usize,
    answers: Vec<AnswerRecord>,
    submitted_current: bool,
    timer: CountdownTimer,
    finish_reason: Option<FinishReason>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            clock,
            status: SessionStatus::NotStarted,
            source: Vec::new(),
            options: QuizOptions::default(),
            questions: Vec::new(),
            current: 0,
            score: 0,
            answers: Vec::new(),
            submitted_current: false,
            timer: CountdownTimer::open_ended(),
            finish_reason: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Start the quiz with a thread-local RNG for shuffling.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::start_with_rng`].
    pub fn start(
        &mut self,
        questions: Vec<Question>,
        options: QuizOptions,
    ) -> Result<(), SessionError> {
        self.start_with_rng(questions, options, &mut rand::rng())
    }

    /// Build the working set and move to `InProgress`.
    ///
    /// When the count cap applies the bank is shuffled and truncated; the bank
    /// records themselves are never modified. The countdown starts when a time
    /// limit is given; otherwise elapsed time still counts up.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `NotStarted`,
    /// and `SessionError::Empty` if `questions` is empty.
    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        questions: Vec<Question>,
        options: QuizOptions,
        rng: &mut R,
    ) -> Result<(), SessionError> {
        self.ensure_status("start", SessionStatus::NotStarted)?;
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        let mut working = questions.clone();
        let cap = options
            .limit_count
            .filter(|&limit| limit > 0 && limit < working.len());
        if cap.is_some() || options.shuffle {
            working.shuffle(rng);
        }
        if let Some(limit) = cap {
            working.truncate(limit);
        }

        self.source = questions;
        self.options = options;
        self.questions = working;
        self.current = 0;
        self.score = 0;
        self.answers.clear();
        self.submitted_current = false;
        self.finish_reason = None;
        self.completed_at = None;
        self.started_at = Some(self.clock.now());
        self.timer = CountdownTimer::new(options.time_limit_secs);
        self.timer.start();
        self.status = SessionStatus::InProgress;

        log::info!(
            "quiz {} started: {} of {} questions, time limit {:?}",
            self.id,
            self.questions.len(),
            self.source.len(),
            options.time_limit_secs
        );
        Ok(())
    }

    /// Grade an answer for the current question and log it.
    ///
    /// Does not advance; call [`QuizSession::advance`] after showing feedback.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `InProgress`,
    /// `SessionError::AlreadySubmitted` on a second answer for the same question,
    /// and `SessionError::Evaluation` if the submission does not fit the question.
    pub fn submit_answer(&mut self, submission: Submission) -> Result<&AnswerRecord, SessionError> {
        self.ensure_status("submit an answer", SessionStatus::InProgress)?;
        if self.submitted_current {
            return Err(SessionError::AlreadySubmitted {
                index: self.current,
            });
        }

        let question = self
            .questions
            .get(self.current)
            .ok_or(SessionError::InvalidState {
                operation: "submit an answer",
                status: self.status,
            })?;
        let is_correct = evaluate(question, &submission)?;
        let record = AnswerRecord {
            question_id: question.id(),
            question_index: self.current,
            submission,
            is_correct,
        };

        log::debug!(
            "quiz {}: question {} answered ({})",
            self.id,
            record.question_id,
            if is_correct { "correct" } else { "incorrect" }
        );

        if is_correct {
            self.score += 1;
        }
        self.submitted_current = true;
        self.answers.push(record);
        self.answers.last().ok_or(SessionError::NotSubmitted {
            index: self.current,
        })
    }

    /// Acknowledge feedback for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `InProgress` and
    /// `SessionError::NotSubmitted` if the current question has no answer yet.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        self.ensure_status("advance", SessionStatus::InProgress)?;
        if !self.submitted_current {
            return Err(SessionError::NotSubmitted {
                index: self.current,
            });
        }

        if self.current + 1 >= self.questions.len() {
            self.finish(FinishReason::Completed);
            return Ok(Advance::Finished);
        }

        self.current += 1;
        self.submitted_current = false;
        Ok(Advance::Next(self.current))
    }

    /// End the session immediately, answered or not.
    ///
    /// Returns `true` if this call moved the session to `Finished`; calling it
    /// on a session that is not in progress is a no-op returning `false`.
    pub fn force_finish(&mut self, reason: FinishReason) -> bool {
        if self.status != SessionStatus::InProgress {
            return false;
        }
        self.finish(reason);
        true
    }

    /// Feed one wall-clock second to the countdown.
    ///
    /// On the expiring tick the session is force-finished with
    /// `FinishReason::TimeExpired`. Returns `None` once the session is not running.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        let tick = self.timer.tick()?;
        if tick.expired {
            log::info!("quiz {}: time limit reached", self.id);
            self.force_finish(FinishReason::TimeExpired);
        }
        Some(tick)
    }

    /// Discard everything and return to `NotStarted`.
    pub fn reset(&mut self) {
        *self = Self::new(self.clock);
    }

    /// Start over with the same bank and options (re-shuffled if they call for it).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the session was never started.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        let source = std::mem::take(&mut self.source);
        let options = self.options;
        self.reset();
        self.start(source, options)
    }

    fn finish(&mut self, reason: FinishReason) {
        self.timer.stop();
        self.status = SessionStatus::Finished;
        self.finish_reason = Some(reason);
        self.completed_at = Some(self.clock.now());
        log::info!(
            "quiz {} finished ({:?}): {}/{} correct, {} unanswered",
            self.id,
            reason,
            self.score,
            self.answers.len(),
            self.questions.len().saturating_sub(self.answers.len())
        );
    }

    fn ensure_status(
        &self,
        operation: &'static str,
        expected: SessionStatus,
    ) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    /// Update the clock used for the completion stamp. Useful with fixed clocks in tests.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The question awaiting an answer or acknowledgement, while in progress.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.status == SessionStatus::InProgress {
            self.questions.get(self.current)
        } else {
            None
        }
    }

    /// True once the current question has an answer and is waiting on `advance`.
    #[must_use]
    pub fn awaiting_advance(&self) -> bool {
        self.status == SessionStatus::InProgress && self.submitted_current
    }

    #[must_use]
    pub fn score(&self) -> usize {
        self.score
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u32 {
        self.timer.elapsed_seconds()
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.timer.limit()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.timer.remaining_seconds()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            status: self.status,
            total: self.questions.len(),
            answered: self.answers.len(),
            current_index: self.current,
            remaining_questions: self.questions.len().saturating_sub(self.answers.len()),
            score: self.score,
            awaiting_advance: self.awaiting_advance(),
            elapsed_seconds: self.elapsed_seconds(),
            remaining_seconds: self.remaining_seconds(),
        }
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        summarize(self)
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("score", &self.score)
            .field("answers_len", &self.answers.len())
            .field("elapsed", &self.timer.elapsed_seconds())
            .field("remaining", &self.timer.remaining_seconds())
            .field("finish_reason", &self.finish_reason)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
