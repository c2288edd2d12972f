use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Wall-clock driver for a quiz countdown.
///
/// A background task sends one unit per period; the consumer feeds each one to
/// `QuizSession::tick`. The task stops when the ticker is stopped or dropped.
pub struct CountdownTicker {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl CountdownTicker {
    /// One tick per second.
    #[must_use]
    pub fn every_second() -> Self {
        Self::with_period(Duration::from_secs(1))
    }

    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            // First tick lands one period from now, not immediately.
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { rx, task }
    }

    /// Wait for the next tick. Returns `None` once stopped.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    pub fn stop(&mut self) {
        self.task.abort();
        self.rx.close();
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionDraft, QuestionId, QuestionKind};
    use quiz_core::time::fixed_clock;
    use quiz_core::{FinishReason, QuizOptions, QuizSession};

    fn question() -> Question {
        QuestionDraft::choice(
            QuestionId::new(1),
            QuestionKind::Single,
            "Q",
            vec!["a".into(), "b".into()],
            vec![0],
        )
        .validate()
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let start = Instant::now();
        let mut ticker = CountdownTicker::every_second();

        ticker.next().await.unwrap();
        ticker.next().await.unwrap();
        ticker.next().await.unwrap();
        assert_eq!(start.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_yields_none() {
        let mut ticker = CountdownTicker::every_second();
        ticker.next().await.unwrap();
        ticker.stop();
        assert!(ticker.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drives_session_to_time_expiry() {
        let mut session = QuizSession::new(fixed_clock());
        session
            .start(vec![question()], QuizOptions::default().with_time_limit(3))
            .unwrap();

        let mut ticker = CountdownTicker::every_second();
        while ticker.next().await.is_some() {
            if let Some(tick) = session.tick() {
                if tick.expired {
                    break;
                }
            }
        }
        ticker.stop();

        assert!(session.is_finished());
        assert_eq!(session.finish_reason(), Some(FinishReason::TimeExpired));
        assert_eq!(session.elapsed_seconds(), 3);
    }
}
