use std::collections::BTreeSet;
use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use quiz_core::model::{Question, QuestionKind, Submission};
use quiz_core::time::format_mm_ss;
use quiz_core::{Advance, FinishReason, LeftSelection, MatchingBoard, SessionSummary};
use services::{
    ActiveQuiz, AnswerFeedback, CountdownTicker, QuizLoopService, QuizServiceError, SaveOutcome,
};

type Input = Lines<BufReader<Stdin>>;

/// Countdown reminders, in remaining seconds.
const REMINDERS: [u32; 3] = [60, 30, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoardCommand {
    Left(usize),
    Right(usize),
    Clear,
    Done,
}

/// Parses `l<n>`, `r<n>`, `clear` or `done`. Item numbers are 1-based.
fn parse_board_command(input: &str) -> Option<BoardCommand> {
    let input = input.trim().to_ascii_lowercase();
    match input.as_str() {
        "done" | "d" => return Some(BoardCommand::Done),
        "clear" | "c" => return Some(BoardCommand::Clear),
        _ => {}
    }
    let (side, number): (fn(usize) -> BoardCommand, &str) =
        if let Some(rest) = input.strip_prefix('l') {
            (BoardCommand::Left, rest)
        } else if let Some(rest) = input.strip_prefix('r') {
            (BoardCommand::Right, rest)
        } else {
            return None;
        };
    let n: usize = number.trim().parse().ok()?;
    n.checked_sub(1).map(side)
}

/// Parses `1`, `1,3` or `1 3` into 0-based option indices.
fn parse_choice(input: &str, option_count: usize) -> Option<BTreeSet<usize>> {
    let mut picked = BTreeSet::new();
    for part in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
    {
        let n: usize = part.parse().ok()?;
        if n == 0 || n > option_count {
            return None;
        }
        picked.insert(n - 1);
    }
    (!picked.is_empty()).then_some(picked)
}

/// Play quizzes until the user declines another round.
///
/// # Errors
///
/// Returns an error if the bank cannot be loaded, stdin fails, or saving fails
/// with a non-retryable error.
pub async fn run_quiz(service: &QuizLoopService) -> Result<(), Box<dyn Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut quiz = service.start_quiz().await?;

    loop {
        play_round(service, &mut quiz, &mut input).await?;
        render_summary(&quiz.summary());
        save_with_retry(service, &mut quiz, &mut input).await?;

        println!("Play again? [y/N]");
        match input.next_line().await? {
            Some(line) if line.trim().eq_ignore_ascii_case("y") => service.restart(&mut quiz)?,
            _ => return Ok(()),
        }
    }
}

async fn play_round(
    service: &QuizLoopService,
    quiz: &mut ActiveQuiz,
    input: &mut Input,
) -> Result<(), Box<dyn Error>> {
    let mut ticker = CountdownTicker::every_second();
    let mut board = MatchingBoard::new();
    if let Some(limit) = quiz.session().time_limit_secs() {
        println!("You have {} for this quiz.", format_mm_ss(limit));
    }
    render_question(quiz);

    while !quiz.is_finished() {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    service.abandon(quiz);
                    break;
                };
                handle_line(service, quiz, &mut board, line.trim())?;
            }
            Some(()) = ticker.next() => {
                let Some(tick) = quiz.tick() else { continue };
                if tick.expired {
                    println!("\nTime is up.");
                } else if let Some(remaining) = tick.remaining_seconds {
                    if REMINDERS.contains(&remaining) {
                        println!("[{} left]", format_mm_ss(remaining));
                    }
                }
            }
        }
    }

    ticker.stop();
    Ok(())
}

fn handle_line(
    service: &QuizLoopService,
    quiz: &mut ActiveQuiz,
    board: &mut MatchingBoard,
    line: &str,
) -> Result<(), QuizServiceError> {
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("q") {
        service.abandon(quiz);
        return Ok(());
    }

    if quiz.session().awaiting_advance() {
        if let Advance::Next(_) = service.advance(quiz)? {
            board.clear();
            render_question(quiz);
        }
        return Ok(());
    }

    let Some(question) = quiz.session().current_question().cloned() else {
        return Ok(());
    };

    let submission = match question.matching() {
        Some(spec) => {
            let Some(command) = parse_board_command(line) else {
                println!("Use l<n> and r<n> to connect items, clear to start over, done to submit.");
                return Ok(());
            };
            match command {
                BoardCommand::Left(i) if i < spec.left_items().len() => {
                    match board.select_left(i) {
                        LeftSelection::Disconnected(c) => {
                            println!("Removed l{} -> r{}", c.left + 1, c.right + 1);
                        }
                        LeftSelection::Pending(i) => println!("l{} selected", i + 1),
                        LeftSelection::Cancelled(i) => println!("l{} deselected", i + 1),
                    }
                    return Ok(());
                }
                BoardCommand::Right(i) if i < spec.right_items().len() => {
                    match board.select_right(i) {
                        Some(c) => println!("Connected l{} -> r{}", c.left + 1, c.right + 1),
                        None => println!("Select a left item first."),
                    }
                    return Ok(());
                }
                BoardCommand::Left(_) | BoardCommand::Right(_) => {
                    println!("No such item.");
                    return Ok(());
                }
                BoardCommand::Clear => {
                    board.clear();
                    println!("Connections cleared.");
                    return Ok(());
                }
                BoardCommand::Done => board.to_submission(),
            }
        }
        None => match parse_choice(line, question.options().len()) {
            Some(picked) if question.kind() == QuestionKind::Single && picked.len() != 1 => {
                println!("Pick exactly one option.");
                return Ok(());
            }
            Some(picked) => Submission::choices(picked),
            None => {
                println!("Enter option numbers, e.g. 2 or 1,3.");
                return Ok(());
            }
        },
    };

    let feedback = service.submit(quiz, submission)?;
    render_feedback(&question, &feedback);
    Ok(())
}

async fn save_with_retry(
    service: &QuizLoopService,
    quiz: &mut ActiveQuiz,
    input: &mut Input,
) -> Result<(), Box<dyn Error>> {
    loop {
        match service.finalize(quiz).await {
            Ok(SaveOutcome::Saved(id)) => {
                println!("Attempt saved ({id}).");
                return Ok(());
            }
            Ok(SaveOutcome::Skipped) => {
                println!("Not logged in; attempt was not saved.");
                return Ok(());
            }
            Err(err) if err.is_retryable() => {
                println!("Saving failed: {err}. Retry? [y/N]");
                match input.next_line().await? {
                    Some(line) if line.trim().eq_ignore_ascii_case("y") => {}
                    _ => return Ok(()),
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn render_question(quiz: &ActiveQuiz) {
    let progress = quiz.session().progress();
    let Some(question) = quiz.session().current_question() else {
        return;
    };

    println!();
    println!(
        "Question {}/{} ({})",
        progress.current_index + 1,
        progress.total,
        question.kind()
    );
    println!("{}", question.prompt());
    if let Some(url) = question.image_url() {
        println!("(image: {url})");
    }

    match question.matching() {
        Some(spec) => {
            for (i, item) in spec.left_items().iter().enumerate() {
                println!("  l{}. {item}", i + 1);
            }
            for (i, item) in spec.right_items().iter().enumerate() {
                println!("  r{}. {item}", i + 1);
            }
            println!("Connect with l<n> then r<n>; type done to submit.");
        }
        None => {
            for (i, option) in question.options().iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
            if question.kind() == QuestionKind::Multiple {
                println!("Select all that apply, e.g. 1,3.");
            }
        }
    }
}

fn render_feedback(question: &Question, feedback: &AnswerFeedback) {
    if feedback.is_correct {
        println!("Correct!");
    } else {
        println!("Incorrect.");
        match question.matching() {
            Some(spec) => {
                for c in &feedback.missing_connections {
                    let left = spec.left_items().get(c.left).map_or("?", String::as_str);
                    let right = spec.right_items().get(c.right).map_or("?", String::as_str);
                    println!("  missing: {left} -> {right}");
                }
            }
            None => {
                let answers: Vec<&str> = feedback
                    .correct_answers
                    .iter()
                    .filter_map(|&i| question.options().get(i).map(String::as_str))
                    .collect();
                println!("  answer: {}", answers.join(", "));
            }
        }
    }
    if !feedback.explanation.is_empty() {
        println!("{}", feedback.explanation);
    }
    if feedback.is_last {
        println!("Press Enter to see your results.");
    } else {
        println!("Press Enter for the next question.");
    }
}

fn render_summary(summary: &SessionSummary) {
    println!();
    match summary.finish_reason {
        Some(FinishReason::TimeExpired) => println!("Quiz over: time expired."),
        Some(FinishReason::Abandoned) => println!("Quiz stopped."),
        _ => println!("Quiz complete."),
    }
    println!(
        "Score: {}/{} ({}%) in {}",
        summary.correct,
        summary.answered,
        summary.percentage,
        format_mm_ss(summary.elapsed_seconds)
    );
    if summary.unanswered > 0 {
        println!("Unanswered: {}", summary.unanswered);
    }
    for result in &summary.results {
        let mark = if result.is_correct { "ok " } else { "x  " };
        println!("  {mark}{}", result.prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_choice_lists() {
        assert_eq!(parse_choice("2", 3), Some(BTreeSet::from([1])));
        assert_eq!(parse_choice("3, 1", 3), Some(BTreeSet::from([0, 2])));
        assert_eq!(parse_choice("1 2", 3), Some(BTreeSet::from([0, 1])));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("", 3), None);
        assert_eq!(parse_choice("a", 3), None);
    }

    #[test]
    fn parses_board_commands() {
        assert_eq!(parse_board_command("l1"), Some(BoardCommand::Left(0)));
        assert_eq!(parse_board_command("R 3"), Some(BoardCommand::Right(2)));
        assert_eq!(parse_board_command("done"), Some(BoardCommand::Done));
        assert_eq!(parse_board_command("clear"), Some(BoardCommand::Clear));
        assert_eq!(parse_board_command("l0"), None);
        assert_eq!(parse_board_command("x1"), None);
        assert_eq!(parse_board_command(""), None);
    }
}
