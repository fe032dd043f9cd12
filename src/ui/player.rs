use std::time::{Duration, Instant};

/// Autoplay periods offered by the speed selector.
pub const PERIOD_PRESETS_MS: [u64; 5] = [100, 250, 500, 1000, 2000];

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Scrubbing,
    Autoplaying,
}

/// Tracks the requested position and the autoplay timer.
///
/// Time is passed in by the caller, so the event loop decides when ticks
/// are delivered and tests can drive the clock directly.
pub struct Player {
    state: PlaybackState,
    len: usize,
    requested: usize,
    period: Duration,
    next_tick: Option<Instant>,
}

impl Player {
    /// Starts idle at the last (most recent) position.
    pub fn new(len: usize, period: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            len,
            requested: len.saturating_sub(1),
            period,
            next_tick: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the autoplay timer next fires, if it is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    fn last(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Direct position input. Stops autoplay.
    pub fn seek(&mut self, position: usize) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.next_tick = None;
        self.state = PlaybackState::Scrubbing;
        self.requested = position.min(self.last());
        Some(self.requested)
    }

    /// Moves by `delta`. Out-of-range steps leave the position unchanged.
    pub fn step(&mut self, delta: isize) -> Option<usize> {
        let target = self.requested.checked_add_signed(delta)?;
        if target >= self.len {
            return None;
        }
        self.requested = target;
        Some(target)
    }

    /// Starts autoplay, wrapping to the first position when already at
    /// the last one. Returns the position to show now.
    pub fn play(&mut self, now: Instant) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        if self.requested == self.last() {
            self.requested = 0;
        }
        if self.requested < self.last() {
            self.state = PlaybackState::Autoplaying;
            self.next_tick = Some(now + self.period);
        } else {
            self.state = PlaybackState::Idle;
            self.next_tick = None;
        }
        Some(self.requested)
    }

    pub fn pause(&mut self) {
        self.next_tick = None;
        self.state = PlaybackState::Idle;
    }

    /// Changes the period; a running timer restarts from `now`.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        self.period = period;
        if self.state == PlaybackState::Autoplaying {
            self.next_tick = Some(now + period);
        }
    }

    pub fn faster(&mut self, now: Instant) {
        let current = self.period.as_millis() as u64;
        if let Some(&ms) = PERIOD_PRESETS_MS.iter().rev().find(|&&ms| ms < current) {
            self.set_period(Duration::from_millis(ms), now);
        }
    }

    pub fn slower(&mut self, now: Instant) {
        let current = self.period.as_millis() as u64;
        if let Some(&ms) = PERIOD_PRESETS_MS.iter().find(|&&ms| ms > current) {
            self.set_period(Duration::from_millis(ms), now);
        }
    }

    /// Advances autoplay if the timer is due. Reaching the last position
    /// stops playback in the same tick.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let deadline = self.next_tick?;
        if self.state != PlaybackState::Autoplaying || now < deadline {
            return None;
        }
        if self.requested >= self.last() {
            self.pause();
            return None;
        }

        self.requested += 1;
        if self.requested == self.last() {
            self.pause();
        } else {
            let next = deadline + self.period;
            self.next_tick = Some(if next <= now { now + self.period } else { next });
        }
        Some(self.requested)
    }
}
