use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::cache::{Bitmap, ImageCache};
use super::fetch::{FetchError, FetchImage};
use super::inflight::{FetchId, InFlight};
use super::queue::PendingQueue;
use super::sequence::Sequence;

/// Settled result of one fetch task, delivered to the event loop.
pub struct FetchOutcome {
    pub position: usize,
    pub fetch_id: FetchId,
    pub result: Result<Bitmap, FetchError>,
}

/// Fetches that settled without a bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub failed: u64,
    pub cancelled: u64,
}

/// Decides which positions to fetch, in which order, and how many at once.
///
/// Owned by the event loop; fetch tasks only report back through the
/// outcome channel returned by [`Scheduler::new`].
pub struct Scheduler<F: FetchImage> {
    sequence: Arc<Sequence>,
    fetcher: Arc<F>,
    cache: ImageCache,
    pending: PendingQueue,
    in_flight: InFlight,
    cap: usize,
    requested: usize,
    failure_cooldown: Duration,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
    stats: SchedulerStats,
}

impl<F: FetchImage> Scheduler<F> {
    /// Every position starts pending, prioritized towards `requested`.
    /// Nothing is fetched until the first [`Scheduler::pump`].
    pub fn new(
        sequence: Arc<Sequence>,
        fetcher: Arc<F>,
        cap: usize,
        requested: usize,
        failure_cooldown: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let len = sequence.len();
        let scheduler = Self {
            sequence,
            fetcher,
            cache: ImageCache::new(),
            pending: PendingQueue::with_all(len, requested),
            in_flight: InFlight::new(),
            cap: cap.max(1),
            requested,
            failure_cooldown,
            outcomes: tx,
            stats: SchedulerStats::default(),
        };
        (scheduler, rx)
    }

    #[cfg(test)]
    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn pending_order(&self) -> Vec<usize> {
        self.pending.iter().collect()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, position: usize) -> bool {
        self.in_flight.contains(position)
    }

    /// Moves the requested position: reorder the queue, drop stale in-flight
    /// work, then refill free slots in the new order.
    pub fn retarget(&mut self, target: usize) {
        self.requested = target;
        self.pending.reprioritize(target);
        let cancelled = self.in_flight.prune_irrelevant(target, &self.pending, self.cap);
        if !cancelled.is_empty() {
            debug!("retarget {target}: cancelling stale fetches {cancelled:?}");
        }
        self.pump();
    }

    /// Starts fetches until the cap is reached or nothing is pending.
    pub fn pump(&mut self) {
        while self.in_flight.len() < self.cap {
            let Some(position) = self.pending.take_next() else {
                break;
            };
            if self.cache.contains(position) {
                continue;
            }
            self.start_fetch(position);
        }
    }

    fn start_fetch(&mut self, position: usize) {
        let Some(locator) = self.sequence.locator(position).map(str::to_owned) else {
            return;
        };
        let (fetch_id, token) = self.in_flight.register(position);
        debug!("fetch {position} started ({locator})");

        let fetcher = Arc::clone(&self.fetcher);
        let outcomes = self.outcomes.clone();
        let cooldown = self.failure_cooldown;
        tokio::spawn(async move {
            let mut result = fetcher.fetch(&locator, token.clone()).await;
            if matches!(&result, Err(e) if !e.is_cancelled()) && !cooldown.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => result = Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(cooldown) => {}
                }
            }
            let _ = outcomes.send(FetchOutcome {
                position,
                fetch_id,
                result,
            });
        });
    }

    /// Settles a finished fetch. Returns the position to render when the
    /// fetch produced the currently requested bitmap.
    pub fn handle_outcome(&mut self, outcome: FetchOutcome) -> Option<usize> {
        let FetchOutcome {
            position,
            fetch_id,
            result,
        } = outcome;
        if !self.in_flight.settle(position, fetch_id) {
            debug!("ignoring stale outcome for {position}");
            return None;
        }

        let render = match result {
            Ok(bitmap) => {
                self.cache.insert(position, bitmap);
                debug!("fetch {position} completed");
                (position == self.requested).then_some(position)
            }
            Err(FetchError::Cancelled) => {
                self.stats.cancelled += 1;
                debug!("fetch {position} cancelled, requeued");
                self.requeue(position);
                None
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("fetch {position} failed, requeued: {e}");
                self.requeue(position);
                None
            }
        };

        self.pump();
        render
    }

    fn requeue(&mut self, position: usize) {
        if !self.cache.contains(position) {
            self.pending.requeue(position);
        }
    }
}

impl<F: FetchImage> Drop for Scheduler<F> {
    fn drop(&mut self) {
        self.in_flight.cancel_all();
    }
}
