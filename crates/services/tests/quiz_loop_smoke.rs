use std::sync::Arc;

use quiz_core::model::{QuestionKind, Submission, UserId};
use quiz_core::time::fixed_now;
use quiz_core::{Advance, FinishReason, QuizOptions};
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{
    AttemptHistoryService, AuthState, Clock, QuizLoopService, SaveOutcome,
};
use storage::sqlite::SqliteRepository;
use storage::JsonFileBank;

const BANK: &str = r#"[
    {"id": 1, "type": "single", "prompt": "Largest planet?", "options": ["Mars", "Jupiter"], "correctAnswers": [1]},
    {"id": 2, "type": "multiple", "prompt": "Even numbers", "options": ["1", "2", "4"], "correctAnswers": [1, 2]},
    {"id": 3, "type": "matching", "prompt": "Match", "leftItems": ["a", "b"], "rightItems": ["B", "A"], "correctMatches": {"0": 1, "1": 0}},
    {"id": 4, "type": "single", "prompt": "Bad", "options": ["x"], "correctAnswers": [3]}
]"#;

fn write_bank(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("{name}-{}.json", std::process::id()));
    std::fs::write(&path, BANK).unwrap();
    path
}

#[tokio::test]
async fn quiz_loop_saves_attempt_to_sqlite() {
    let bank_path = write_bank("quiz-loop-smoke");
    let repo = SqliteRepository::open("sqlite:file:memdb_quiz_loop_smoke?mode=memory&cache=shared")
        .await
        .unwrap();
    let user = UserId::new("learner");

    let svc = QuizLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(JsonFileBank::new(&bank_path)),
        Arc::new(repo.clone()),
        Arc::new(AuthState::User(user.clone())),
    )
    .with_options(QuizOptions::default().with_shuffle(true));

    let mut rng = StdRng::seed_from_u64(7);
    let mut quiz = svc.start_quiz_with_rng(&mut rng).await.unwrap();
    assert_eq!(quiz.session().questions().len(), 3);

    loop {
        let question = quiz.session().current_question().unwrap().clone();
        let submission = match question.kind() {
            QuestionKind::Single => Submission::single(1),
            QuestionKind::Multiple => Submission::choices([1, 2]),
            QuestionKind::Matching => Submission::matches([(0, 1), (1, 0)]),
        };
        let feedback = svc.submit(&mut quiz, submission).unwrap();
        assert!(feedback.is_correct);
        if svc.advance(&mut quiz).unwrap() == Advance::Finished {
            break;
        }
    }

    let summary = quiz.summary();
    assert_eq!(summary.finish_reason, Some(FinishReason::Completed));
    assert_eq!(summary.percentage, 100);

    let SaveOutcome::Saved(id) = svc.finalize(&mut quiz).await.unwrap() else {
        panic!("expected attempt to be saved");
    };

    let history = AttemptHistoryService::new(Arc::new(repo));
    let items = history.list_recent(&user, 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].correct_answers, 3);

    let stored = history.get(&id).await.unwrap();
    assert_eq!(stored.payload.question_results.len(), 3);

    std::fs::remove_file(bank_path).ok();
}

#[tokio::test]
async fn capped_quiz_uses_subset_of_bank() {
    let bank_path = write_bank("quiz-loop-capped");
    let repo = storage::InMemoryRepository::new();
    let svc = QuizLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(JsonFileBank::new(&bank_path)),
        Arc::new(repo),
        Arc::new(AuthState::Anonymous),
    )
    .with_options(QuizOptions::default().with_limit_count(2));

    let quiz = svc.start_quiz().await.unwrap();
    assert_eq!(quiz.session().questions().len(), 2);

    std::fs::remove_file(bank_path).ok();
}
