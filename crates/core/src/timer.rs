//! Once-per-second countdown clock.
//!
//! The timer does not own a thread or a runtime; whoever drives it calls
//! [`CountdownTimer::tick`] once per wall-clock second while it is running.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
}

/// Snapshot produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub elapsed_seconds: u32,
    pub remaining_seconds: Option<u32>,
    /// True only on the tick where the countdown ran out.
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    state: TimerState,
    limit: Option<u32>,
    elapsed: u32,
    remaining: Option<u32>,
    expired: bool,
}

impl CountdownTimer {
    /// `None` gives an open-ended timer that counts up and never expires.
    #[must_use]
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            state: TimerState::Stopped,
            limit,
            elapsed: 0,
            remaining: limit,
            expired: false,
        }
    }

    #[must_use]
    pub fn open_ended() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn with_limit(secs: u32) -> Self {
        Self::new(Some(secs))
    }

    /// Start ticking. Returns `false` if the timer was already running.
    pub fn start(&mut self) -> bool {
        if self.state == TimerState::Running {
            return false;
        }
        self.state = TimerState::Running;
        true
    }

    /// Stop ticking; elapsed and remaining keep their last values.
    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
    }

    /// Stop and rewind to the configured limit.
    pub fn reset(&mut self) {
        *self = Self::new(self.limit);
    }

    /// Advance by one second. Returns `None` while stopped.
    ///
    /// Expiry is reported on exactly one tick: the one where `remaining`
    /// reaches zero. Later ticks keep counting `elapsed` but never re-fire.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.state != TimerState::Running {
            return None;
        }

        self.elapsed = self.elapsed.saturating_add(1);
        let mut fired = false;
        if let Some(remaining) = self.remaining {
            let next = remaining.saturating_sub(1);
            self.remaining = Some(next);
            if next == 0 && !self.expired {
                self.expired = true;
                fired = true;
            }
        }

        Some(Tick {
            elapsed_seconds: self.elapsed,
            remaining_seconds: self.remaining,
            expired: fired,
        })
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expired
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::open_ended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_ticks_on_sixty_second_limit_expire_once() {
        let mut timer = CountdownTimer::with_limit(60);
        assert!(timer.start());

        let fired: Vec<u32> = (1..=60)
            .filter_map(|_| timer.tick())
            .filter(|t| t.expired)
            .map(|t| t.elapsed_seconds)
            .collect();

        assert_eq!(fired, vec![60]);
        assert_eq!(timer.remaining_seconds(), Some(0));
        assert!(timer.has_expired());
    }

    #[test]
    fn ticks_after_expiry_do_not_refire_or_go_negative() {
        let mut timer = CountdownTimer::with_limit(2);
        timer.start();
        timer.tick();
        assert!(timer.tick().unwrap().expired);

        for _ in 0..5 {
            let tick = timer.tick().unwrap();
            assert!(!tick.expired);
            assert_eq!(tick.remaining_seconds, Some(0));
        }
        assert_eq!(timer.elapsed_seconds(), 7);
    }

    #[test]
    fn open_ended_timer_never_expires() {
        let mut timer = CountdownTimer::open_ended();
        timer.start();
        for _ in 0..1_000 {
            let tick = timer.tick().unwrap();
            assert!(!tick.expired);
            assert_eq!(tick.remaining_seconds, None);
        }
        assert_eq!(timer.elapsed_seconds(), 1_000);
    }

    #[test]
    fn start_is_idempotent() {
        let mut timer = CountdownTimer::with_limit(10);
        assert!(timer.start());
        assert!(!timer.start());
        timer.tick();
        assert_eq!(timer.remaining_seconds(), Some(9));
    }

    #[test]
    fn stopped_timer_ignores_ticks_but_keeps_values() {
        let mut timer = CountdownTimer::with_limit(10);
        timer.start();
        timer.tick();
        timer.tick();
        timer.stop();

        assert_eq!(timer.tick(), None);
        assert_eq!(timer.elapsed_seconds(), 2);
        assert_eq!(timer.remaining_seconds(), Some(8));
    }

    #[test]
    fn zero_limit_expires_on_first_tick() {
        let mut timer = CountdownTimer::with_limit(0);
        timer.start();
        assert!(timer.tick().unwrap().expired);
    }

    #[test]
    fn reset_rewinds_to_limit() {
        let mut timer = CountdownTimer::with_limit(3);
        timer.start();
        timer.tick();
        timer.reset();
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.remaining_seconds(), Some(3));
        assert_eq!(timer.elapsed_seconds(), 0);
        assert!(!timer.has_expired());
    }
}
