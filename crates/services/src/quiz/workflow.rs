use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;

use quiz_core::matching::missing_connections;
use quiz_core::model::{AttemptId, QuestionId, Submission};
use quiz_core::{
    Advance, Connection, FinishReason, QuizOptions, QuizSession, SessionError, SessionSummary,
    Tick,
};
use storage::repository::{AttemptStore, QuestionBank};

use crate::Clock;
use crate::auth::AuthProvider;
use crate::error::QuizServiceError;

/// Feedback shown after grading one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub explanation: String,
    pub correct_answers: BTreeSet<usize>,
    /// Required pairs the user missed; empty for choice questions.
    pub missing_connections: Vec<Connection>,
    pub is_last: bool,
}

/// Result of handing a finished quiz to persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(AttemptId),
    /// Nobody is logged in; the attempt stays local.
    Skipped,
}

/// A running quiz plus the id it was stored under, once saved.
#[derive(Debug)]
pub struct ActiveQuiz {
    session: QuizSession,
    attempt_id: Option<AttemptId>,
}

impl ActiveQuiz {
    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        self.session.summary()
    }

    /// Forward one second to the session countdown.
    pub fn tick(&mut self) -> Option<Tick> {
        self.session.tick()
    }
}

/// Orchestrates a quiz from bank load to attempt persistence.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    bank: Arc<dyn QuestionBank>,
    attempts: Arc<dyn AttemptStore>,
    auth: Arc<dyn AuthProvider>,
    module: String,
    options: QuizOptions,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<dyn QuestionBank>,
        attempts: Arc<dyn AttemptStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            clock,
            bank,
            attempts,
            auth,
            module: "quiz".to_owned(),
            options: QuizOptions::default(),
        }
    }

    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: QuizOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Load the bank and start a new quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the bank cannot be loaded or holds no questions.
    pub async fn start_quiz(&self) -> Result<ActiveQuiz, QuizServiceError> {
        let questions = self.bank.load_questions().await?;
        let mut session = QuizSession::new(self.clock);
        session.start(questions, self.options)?;
        Ok(ActiveQuiz {
            session,
            attempt_id: None,
        })
    }

    /// Like [`QuizLoopService::start_quiz`] with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the bank cannot be loaded or holds no questions.
    pub async fn start_quiz_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<ActiveQuiz, QuizServiceError> {
        let questions = self.bank.load_questions().await?;
        let mut session = QuizSession::new(self.clock);
        session.start_with_rng(questions, self.options, rng)?;
        Ok(ActiveQuiz {
            session,
            attempt_id: None,
        })
    }

    /// Grade the current question and describe the outcome.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` when the session rejects the submission.
    pub fn submit(
        &self,
        quiz: &mut ActiveQuiz,
        submission: Submission,
    ) -> Result<AnswerFeedback, QuizServiceError> {
        let record = quiz.session.submit_answer(submission)?.clone();
        let is_last = record.question_index + 1 >= quiz.session.questions().len();
        let question = quiz
            .session
            .questions()
            .get(record.question_index)
            .ok_or(SessionError::InvalidState {
                operation: "submit an answer",
                status: quiz.session.status(),
            })?;

        let missing = match (question.matching(), record.submission.user_matches()) {
            (Some(spec), Some(user)) => missing_connections(user, spec.correct_matches()),
            _ => Vec::new(),
        };

        Ok(AnswerFeedback {
            question_id: question.id(),
            is_correct: record.is_correct,
            explanation: question.explanation().to_owned(),
            correct_answers: question.correct_answers().clone(),
            missing_connections: missing,
            is_last,
        })
    }

    /// Move past the answered question.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` if the current question is unanswered.
    pub fn advance(&self, quiz: &mut ActiveQuiz) -> Result<Advance, QuizServiceError> {
        Ok(quiz.session.advance()?)
    }

    /// Stop the quiz early. Returns `false` if it had already finished.
    pub fn abandon(&self, quiz: &mut ActiveQuiz) -> bool {
        quiz.session.force_finish(FinishReason::Abandoned)
    }

    /// Start over with the same questions; any saved id is forgotten.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Session` if the quiz was never started.
    pub fn restart(&self, quiz: &mut ActiveQuiz) -> Result<(), QuizServiceError> {
        quiz.session.restart()?;
        quiz.attempt_id = None;
        Ok(())
    }

    /// Persist a finished quiz for the logged-in user.
    ///
    /// Saving is idempotent: once stored, the same id is returned without
    /// another write. A failed save leaves the quiz unsaved so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFinished` while the quiz is running and
    /// `QuizServiceError::Storage` when the store rejects the attempt.
    pub async fn finalize(&self, quiz: &mut ActiveQuiz) -> Result<SaveOutcome, QuizServiceError> {
        if let Some(id) = &quiz.attempt_id {
            return Ok(SaveOutcome::Saved(id.clone()));
        }
        if !quiz.session.is_finished() {
            return Err(QuizServiceError::NotFinished);
        }

        let user = match self.auth.user_id() {
            Some(user) if self.auth.is_authenticated() => user,
            _ => {
                log::info!("quiz {}: not logged in, attempt not saved", quiz.session.id());
                return Ok(SaveOutcome::Skipped);
            }
        };

        let payload = quiz.session.summary().to_payload(&self.module);
        let id = self.attempts.save_attempt(&user, &payload).await.map_err(|err| {
            log::warn!("quiz {}: saving attempt failed: {err}", quiz.session.id());
            err
        })?;
        log::info!("quiz {} saved as attempt {id}", quiz.session.id());
        quiz.attempt_id = Some(id.clone());
        Ok(SaveOutcome::Saved(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::AttemptPayload;
    use quiz_core::model::{Question, QuestionDraft, QuestionKind, UserId};
    use quiz_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::{AttemptHistory, InMemoryRepository, StorageError};

    use crate::auth::AuthState;

    fn bank() -> Vec<Question> {
        vec![
            QuestionDraft::choice(
                QuestionId::new(1),
                QuestionKind::Single,
                "2 + 2?",
                vec!["3".into(), "4".into()],
                vec![1],
            )
            .with_explanation("Arithmetic")
            .validate()
            .unwrap(),
            QuestionDraft::matching(
                QuestionId::new(2),
                "Capitals",
                vec!["France".into(), "Japan".into()],
                vec!["Tokyo".into(), "Paris".into()],
                [(0, 1), (1, 0)].into_iter().collect(),
            )
            .validate()
            .unwrap(),
        ]
    }

    fn service(repo: &InMemoryRepository, auth: AuthState) -> QuizLoopService {
        QuizLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(auth),
        )
    }

    fn answer_all(svc: &QuizLoopService, quiz: &mut ActiveQuiz) {
        loop {
            let question = quiz.session().current_question().unwrap().clone();
            let submission = match question.kind() {
                QuestionKind::Matching => Submission::matches([(0, 1)]),
                _ => Submission::single(1),
            };
            svc.submit(quiz, submission).unwrap();
            if svc.advance(quiz).unwrap() == Advance::Finished {
                break;
            }
        }
    }

    #[tokio::test]
    async fn submit_reports_feedback_and_missing_pairs() {
        let repo = InMemoryRepository::with_questions(bank());
        let svc = service(&repo, AuthState::Anonymous);
        let mut quiz = svc.start_quiz().await.unwrap();

        let first = svc.submit(&mut quiz, Submission::single(1)).unwrap();
        assert!(first.is_correct);
        assert_eq!(first.explanation, "Arithmetic");
        assert!(!first.is_last);
        assert_eq!(svc.advance(&mut quiz).unwrap(), Advance::Next(1));

        let second = svc.submit(&mut quiz, Submission::matches([(0, 1)])).unwrap();
        assert!(!second.is_correct);
        assert!(second.is_last);
        assert_eq!(second.missing_connections, vec![Connection::new(1, 0)]);
    }

    #[tokio::test]
    async fn finalize_requires_finished_quiz() {
        let repo = InMemoryRepository::with_questions(bank());
        let svc = service(&repo, AuthState::User(UserId::new("u1")));
        let mut quiz = svc.start_quiz().await.unwrap();

        assert!(matches!(
            svc.finalize(&mut quiz).await,
            Err(QuizServiceError::NotFinished)
        ));
    }

    #[tokio::test]
    async fn anonymous_attempts_are_not_saved() {
        let repo = InMemoryRepository::with_questions(bank());
        let svc = service(&repo, AuthState::Anonymous);
        let mut quiz = svc.start_quiz().await.unwrap();
        answer_all(&svc, &mut quiz);

        assert_eq!(svc.finalize(&mut quiz).await.unwrap(), SaveOutcome::Skipped);
        assert!(quiz.attempt_id().is_none());
    }

    #[tokio::test]
    async fn finalize_saves_once_for_logged_in_user() {
        let repo = InMemoryRepository::with_questions(bank());
        let user = UserId::new("u1");
        let svc = service(&repo, AuthState::User(user.clone())).with_module("geo");
        let mut quiz = svc.start_quiz().await.unwrap();
        answer_all(&svc, &mut quiz);

        let first = svc.finalize(&mut quiz).await.unwrap();
        let second = svc.finalize(&mut quiz).await.unwrap();
        assert_eq!(first, second);

        let stored = repo.list_attempts(&user, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload.module, "geo");
        assert_eq!(stored[0].payload.correct_answers, 1);
        assert_eq!(stored[0].payload.score_percentage, 50);
    }

    #[tokio::test]
    async fn abandoned_quiz_can_still_be_saved() {
        let repo = InMemoryRepository::with_questions(bank());
        let user = UserId::new("u1");
        let svc = service(&repo, AuthState::User(user.clone()));
        let mut quiz = svc.start_quiz().await.unwrap();

        svc.submit(&mut quiz, Submission::single(1)).unwrap();
        assert!(svc.abandon(&mut quiz));
        assert!(!svc.abandon(&mut quiz));

        let summary = quiz.summary();
        assert_eq!(summary.finish_reason, Some(FinishReason::Abandoned));
        assert_eq!(summary.unanswered, 1);
        assert!(matches!(
            svc.finalize(&mut quiz).await.unwrap(),
            SaveOutcome::Saved(_)
        ));
    }

    struct FlakyStore {
        failures_left: AtomicUsize,
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl AttemptStore for FlakyStore {
        async fn save_attempt(
            &self,
            user: &UserId,
            payload: &AttemptPayload,
        ) -> Result<AttemptId, StorageError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Connection("offline".into()));
            }
            self.inner.save_attempt(user, payload).await
        }
    }

    #[tokio::test]
    async fn failed_save_can_be_retried() {
        let repo = InMemoryRepository::with_questions(bank());
        let store = FlakyStore {
            failures_left: AtomicUsize::new(1),
            inner: repo.clone(),
        };
        let svc = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(store),
            Arc::new(AuthState::User(UserId::new("u1"))),
        );
        let mut quiz = svc.start_quiz().await.unwrap();
        answer_all(&svc, &mut quiz);

        let err = svc.finalize(&mut quiz).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(quiz.attempt_id().is_none());

        let outcome = svc.finalize(&mut quiz).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved(AttemptId::new("1")));
    }

    #[tokio::test]
    async fn restart_forgets_saved_attempt() {
        let repo = InMemoryRepository::with_questions(bank());
        let svc = service(&repo, AuthState::User(UserId::new("u1")));
        let mut quiz = svc.start_quiz().await.unwrap();
        answer_all(&svc, &mut quiz);
        svc.finalize(&mut quiz).await.unwrap();

        svc.restart(&mut quiz).unwrap();
        assert!(quiz.attempt_id().is_none());
        assert!(!quiz.is_finished());
        assert_eq!(quiz.session().answers().len(), 0);
    }
}
