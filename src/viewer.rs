use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::backend::fetch::FetchImage;
use crate::backend::scheduler::{FetchOutcome, Scheduler, SchedulerStats};
use crate::backend::sequence::Sequence;
use crate::ui::player::{PlaybackState, Player};
use crate::ui::render::{FrameQueue, RenderSink};

/// Snapshot of viewer state for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerStatus {
    pub requested: usize,
    pub len: usize,
    pub label: Option<String>,
    pub rendered: Option<usize>,
    /// Label of the frame on screen, which lags `label` while a scrub loads.
    pub rendered_label: Option<String>,
    pub playback: PlaybackState,
    pub period: Duration,
    pub cached: usize,
    pub in_flight: usize,
    pub stats: SchedulerStats,
}

/// One viewing session: navigation drives the scheduler, completed
/// fetches feed the frame queue.
pub struct Viewer<F: FetchImage> {
    sequence: Arc<Sequence>,
    scheduler: Scheduler<F>,
    player: Player,
    frames: FrameQueue,
}

impl<F: FetchImage> Viewer<F> {
    pub fn new(
        sequence: Arc<Sequence>,
        fetcher: Arc<F>,
        concurrency: usize,
        period: Duration,
        failure_cooldown: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let player = Player::new(sequence.len(), period);
        let (scheduler, outcomes) = Scheduler::new(
            Arc::clone(&sequence),
            fetcher,
            concurrency,
            player.requested(),
            failure_cooldown,
        );
        let viewer = Self {
            sequence,
            scheduler,
            player,
            frames: FrameQueue::new(),
        };
        (viewer, outcomes)
    }

    /// Kicks off the initial fetches and asks for the starting frame.
    pub fn start(&mut self) {
        if self.sequence.is_empty() {
            return;
        }
        self.frames.request(self.player.requested());
        self.scheduler.pump();
    }

    #[cfg(test)]
    pub fn player(&self) -> &Player {
        &self.player
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &Scheduler<F> {
        &self.scheduler
    }

    fn retarget(&mut self, position: usize) {
        self.scheduler.retarget(position);
        self.frames.request(position);
    }

    pub fn seek(&mut self, position: usize) {
        if let Some(position) = self.player.seek(position) {
            self.retarget(position);
        }
    }

    pub fn seek_by(&mut self, delta: isize) {
        let target = self
            .player
            .requested()
            .saturating_add_signed(delta);
        self.seek(target);
    }

    pub fn seek_last(&mut self) {
        if let Some(last) = self.sequence.len().checked_sub(1) {
            self.seek(last);
        }
    }

    pub fn step(&mut self, delta: isize) {
        if let Some(position) = self.player.step(delta) {
            self.retarget(position);
        }
    }

    pub fn play(&mut self, now: Instant) {
        if let Some(position) = self.player.play(now) {
            self.retarget(position);
        }
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn toggle_play(&mut self, now: Instant) {
        if self.player.state() == PlaybackState::Autoplaying {
            self.pause();
        } else {
            self.play(now);
        }
    }

    pub fn faster(&mut self, now: Instant) {
        self.player.faster(now);
    }

    pub fn slower(&mut self, now: Instant) {
        self.player.slower(now);
    }

    pub fn autoplay_deadline(&self) -> Option<Instant> {
        self.player.deadline()
    }

    pub fn on_autoplay_tick(&mut self, now: Instant) {
        if let Some(position) = self.player.tick(now) {
            self.retarget(position);
        }
    }

    pub fn handle_outcome(&mut self, outcome: FetchOutcome) {
        if let Some(position) = self.scheduler.handle_outcome(outcome) {
            if position == self.player.requested() {
                self.frames.request(position);
            }
        }
    }

    /// Display refresh: draws the latest requested frame if it is cached.
    pub fn flush<S: RenderSink>(&mut self, sink: &mut S) -> Option<usize> {
        self.frames.flush(self.scheduler.cache(), sink)
    }

    pub fn status(&self) -> ViewerStatus {
        let requested = self.player.requested();
        let rendered = self.frames.rendered();
        ViewerStatus {
            requested,
            len: self.sequence.len(),
            label: self.sequence.label(requested).map(str::to_owned),
            rendered,
            rendered_label: rendered
                .and_then(|p| self.sequence.label(p))
                .map(str::to_owned),
            playback: self.player.state(),
            period: self.player.period(),
            cached: self.scheduler.cache().len(),
            in_flight: self.scheduler.in_flight_len(),
            stats: self.scheduler.stats(),
        }
    }
}
